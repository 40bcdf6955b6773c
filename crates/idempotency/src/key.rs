use serde::{Deserialize, Serialize};

use reconap_core::DomainError;

pub const MAX_KEY_BYTES: usize = 255;

/// A client-supplied `Idempotency-Key`, validated for length only — the
/// spec recommends a v4 UUID but does not mandate the format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        if raw.is_empty() {
            return Err(DomainError::validation("idempotency key cannot be empty"));
        }
        if raw.len() > MAX_KEY_BYTES {
            return Err(DomainError::validation(format!(
                "idempotency key exceeds {MAX_KEY_BYTES} bytes"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_key() {
        let too_long = "a".repeat(MAX_KEY_BYTES + 1);
        assert!(IdempotencyKey::parse(&too_long).is_err());
    }

    #[test]
    fn accepts_uuid_like_key() {
        assert!(IdempotencyKey::parse("3fae1c0a-8c2e-4a8c-9b8d-4e6f6c9b0b11").is_ok());
    }
}
