use sha2::{Digest, Sha256};

/// Stable request fingerprint, not cryptographically secret: a SHA-256
/// digest over method, normalized path, and canonicalized JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn compute(method: &str, normalized_path: &str, body: &serde_json::Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(method.to_ascii_uppercase().as_bytes());
        hasher.update(b"\0");
        hasher.update(normalized_path.as_bytes());
        hasher.update(b"\0");
        hasher.update(canonical_json(body).as_bytes());
        Fingerprint(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl core::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Canonical JSON: object keys sorted, no insignificant whitespace, numbers
/// in their `serde_json` canonical form. Recurses explicitly instead of
/// relying on `serde_json`'s default map ordering so the result is stable
/// regardless of the `preserve_order` feature being enabled transitively.
fn canonical_json(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", canonical_json(&Value::String(k.clone())), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", entries.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_fingerprint() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(
            Fingerprint::compute("POST", "/v1/invoices", &a),
            Fingerprint::compute("POST", "/v1/invoices", &b)
        );
    }

    #[test]
    fn different_bodies_produce_different_fingerprints() {
        let a = Fingerprint::compute("POST", "/v1/invoices", &json!({"total": "10.00"}));
        let b = Fingerprint::compute("POST", "/v1/invoices", &json!({"total": "11.00"}));
        assert_ne!(a, b);
    }

    #[test]
    fn method_is_case_insensitive() {
        let a = Fingerprint::compute("post", "/v1/invoices", &json!({}));
        let b = Fingerprint::compute("POST", "/v1/invoices", &json!({}));
        assert_eq!(a, b);
    }
}
