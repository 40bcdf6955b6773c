use crate::delimiter::detect_delimiter;
use crate::encoding::decode_to_utf8;
use crate::error::{IngestionError, IngestionResult};

/// A successfully decoded and delimiter-sniffed CSV file, still unvalidated
/// row by row.
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub delimiter: u8,
    records: Vec<csv::StringRecord>,
}

impl ParsedCsv {
    /// Row number (1-based, header is row 1) paired with its record.
    pub fn rows(&self) -> impl Iterator<Item = (u64, &csv::StringRecord)> {
        self.records.iter().enumerate().map(|(idx, rec)| (idx as u64 + 2, rec))
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

/// Decodes `bytes` to UTF-8, sniffs the delimiter from the header line, and
/// streams the remainder through an RFC 4180 reader. A malformed record
/// (unclosed quote, ragged structure the `csv` crate itself rejects)
/// terminates the whole batch with a precise row/byte-offset locator rather
/// than being treated as a per-row error, since at that point the file's
/// shape itself cannot be trusted.
pub fn parse_csv(bytes: &[u8], max_bytes: u64) -> IngestionResult<ParsedCsv> {
    if bytes.len() as u64 > max_bytes {
        return Err(IngestionError::FileTooLarge { max_bytes });
    }

    let text = decode_to_utf8(bytes)?;
    let header_line = text.lines().next().ok_or(IngestionError::MissingHeader)?;
    if header_line.trim().is_empty() {
        return Err(IngestionError::MissingHeader);
    }
    let delimiter = detect_delimiter(header_line)?;

    let mut reader = csv::ReaderBuilder::new().delimiter(delimiter).has_headers(true).flexible(false).from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| structural_error(1, &e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let row = idx as u64 + 2;
        let record = result.map_err(|e| structural_error(row, &e))?;
        records.push(record);
    }

    Ok(ParsedCsv { headers, delimiter, records })
}

fn structural_error(row: u64, err: &csv::Error) -> IngestionError {
    let byte_offset = err.position().map(|p| p.byte()).unwrap_or(0);
    IngestionError::StructuralParse { row, byte_offset, message: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_comma_file() {
        let csv_bytes = b"invoice_number,vendor,total\nINV-1,Acme,100.00\nINV-2,Globex,200.00\n";
        let parsed = parse_csv(csv_bytes, 10_000).unwrap();
        assert_eq!(parsed.delimiter, b',');
        assert_eq!(parsed.headers, vec!["invoice_number", "vendor", "total"]);
        assert_eq!(parsed.row_count(), 2);
        let rows: Vec<u64> = parsed.rows().map(|(n, _)| n).collect();
        assert_eq!(rows, vec![2, 3]);
    }

    #[test]
    fn parses_pipe_delimited_file() {
        let csv_bytes = b"invoice_number|vendor|total\nINV-1|Acme|100.00\n";
        let parsed = parse_csv(csv_bytes, 10_000).unwrap();
        assert_eq!(parsed.delimiter, b'|');
    }

    #[test]
    fn empty_file_is_missing_header() {
        assert!(matches!(parse_csv(b"", 10_000), Err(IngestionError::MissingHeader)));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let csv_bytes = b"invoice_number,vendor\nINV-1,Acme\n";
        assert!(matches!(parse_csv(csv_bytes, 5), Err(IngestionError::FileTooLarge { .. })));
    }

    #[test]
    fn unclosed_quote_is_a_structural_error() {
        let csv_bytes = b"invoice_number,vendor\n\"INV-1,Acme\n";
        let err = parse_csv(csv_bytes, 10_000).unwrap_err();
        assert!(matches!(err, IngestionError::StructuralParse { .. }));
    }

    #[test]
    fn ragged_row_is_a_structural_error() {
        let csv_bytes = b"invoice_number,vendor,total\nINV-1,Acme\n";
        let err = parse_csv(csv_bytes, 10_000).unwrap_err();
        assert!(matches!(err, IngestionError::StructuralParse { .. }));
    }
}
