//! One-way digest used for anonymization and submission identity

use sha2::{Digest, Sha256};

/// SHA-256 of the UTF-8 bytes of `text`, rendered as lowercase hex.
pub fn digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
