//! Hashing utilities for canonical output.
//!
//! ```text
//! SHA-256(version.to_be_bytes() || 0x00 || interchange_text_bytes)
//! ```
//!
//! The version is folded in so that a change to the interchange layout never
//! produces a digest that collides with one computed under the old layout.
//!
//! ```rust
//! use canonical::{hash_interchange_bytes, hash_text};
//!
//! assert_eq!(hash_text("sku=ABC").len(), 64);
//! assert_ne!(hash_interchange_bytes(1, b"sku=ABC"), hash_interchange_bytes(2, b"sku=ABC"));
//! ```

use sha2::{Digest, Sha256};

/// Hash arbitrary text with SHA-256 and return a hex digest. Not versioned.
pub fn hash_text(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Version-aware identity digest of interchange text.
pub fn hash_interchange_bytes(version: u32, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(version.to_be_bytes());
    hasher.update([0u8]);
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_text_known_vector() {
        assert_eq!(
            hash_text(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn interchange_hash_differs_from_plain_hash() {
        assert_ne!(hash_interchange_bytes(1, b"qty=5"), hash_text("qty=5"));
    }
}
