use encoding_rs::Encoding;

use crate::error::{IngestionError, IngestionResult};

/// Detects the source encoding via BOM inspection, falling back to a UTF-8
/// validity check, and transcodes to an owned UTF-8 `String`.
///
/// Files with no BOM that are not valid UTF-8 are rejected rather than
/// guessed at further: the spec calls for a file to be rejected outright
/// once neither signal resolves it, rather than silently mis-decoding.
pub fn decode_to_utf8(bytes: &[u8]) -> IngestionResult<String> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (decoded, _, had_errors) = encoding.decode(&bytes[bom_len..]);
        if had_errors {
            return Err(IngestionError::UndeterminedEncoding);
        }
        return Ok(decoded.into_owned());
    }

    String::from_utf8(bytes.to_vec()).map_err(|_| IngestionError::UndeterminedEncoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_utf8_without_bom_decodes() {
        let bytes = "invoice_number,vendor\nINV-1,Acme\n".as_bytes();
        assert_eq!(decode_to_utf8(bytes).unwrap(), "invoice_number,vendor\nINV-1,Acme\n");
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("invoice_number\nINV-1\n".as_bytes());
        assert_eq!(decode_to_utf8(&bytes).unwrap(), "invoice_number\nINV-1\n");
    }

    #[test]
    fn invalid_byte_sequence_without_bom_is_rejected() {
        let bytes: &[u8] = &[0x41, 0x81, 0x42];
        assert!(decode_to_utf8(bytes).is_err());
    }
}
