//! Schema fingerprinting for deduplication.

use sha2::{Digest, Sha256};

/// SHA-256 over the normalized JSON form of a schema definition.
///
/// Whitespace and object key order do not change the fingerprint, so a
/// template reformatted on disk still resolves to the same registry version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaFingerprint(pub [u8; 32]);

impl SchemaFingerprint {
    pub fn compute(definition: &str) -> Self {
        let normalized = normalize_json(definition);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(normalized.as_bytes()));
        Self(digest)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Parse and re-serialize; `serde_json` maps sort their keys.
/// Text that is not JSON is fingerprinted as-is.
pub(crate) fn normalize_json(json: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|_| json.to_string()),
        Err(_) => json.to_string(),
    }
}
