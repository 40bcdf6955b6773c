use thiserror::Error;

/// A batch-terminating failure: malformed structure, undecodable bytes, or
/// an ambiguous delimiter. Distinct from a `RowError`, which fails only the
/// one row.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestionError {
    #[error("could not determine text encoding for this file")]
    UndeterminedEncoding,
    #[error("header row is required but the file is empty")]
    MissingHeader,
    #[error("ambiguous delimiter: more than one of ',', '\\t', '|' fits the header row")]
    AmbiguousDelimiter,
    #[error("structural parse error at row {row}, byte offset {byte_offset}: {message}")]
    StructuralParse { row: u64, byte_offset: u64, message: String },
    #[error("column mapping references unknown header {0:?}")]
    UnknownHeader(String),
    #[error("file exceeds the maximum accepted size of {max_bytes} bytes")]
    FileTooLarge { max_bytes: u64 },
    #[error("import could not commit: {0}")]
    CommitConflict(String),
}

pub type IngestionResult<T> = Result<T, IngestionError>;
