use crate::error::{IngestionError, IngestionResult};

const CANDIDATES: [u8; 3] = [b',', b'\t', b'|'];

/// Picks the delimiter among `{',', '\t', '|'}` whose count on the header
/// line is both non-zero and strictly greater than every other candidate's
/// count. Two candidates tying for the max is rejected as ambiguous.
pub fn detect_delimiter(header_line: &str) -> IngestionResult<u8> {
    let counts: Vec<(u8, usize)> = CANDIDATES
        .iter()
        .map(|&c| (c, header_line.bytes().filter(|&b| b == c).count()))
        .collect();

    let max_count = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if max_count == 0 {
        return Err(IngestionError::AmbiguousDelimiter);
    }
    let winners: Vec<u8> = counts.iter().filter(|(_, n)| *n == max_count).map(|(c, _)| *c).collect();
    match winners.as_slice() {
        [single] => Ok(*single),
        _ => Err(IngestionError::AmbiguousDelimiter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_comma() {
        assert_eq!(detect_delimiter("invoice_number,vendor,total").unwrap(), b',');
    }

    #[test]
    fn detects_pipe() {
        assert_eq!(detect_delimiter("invoice_number|vendor|total").unwrap(), b'|');
    }

    #[test]
    fn detects_tab() {
        assert_eq!(detect_delimiter("invoice_number\tvendor\ttotal").unwrap(), b'\t');
    }

    #[test]
    fn rejects_no_delimiter_present() {
        assert!(detect_delimiter("invoice_number_only").is_err());
    }

    #[test]
    fn rejects_tied_counts_as_ambiguous() {
        assert!(detect_delimiter("a,b|c,d|e").is_err());
    }
}
