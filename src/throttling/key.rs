//! Throttle key derivation.
//!
//! Keys are `<prefix>:<sha256 hex>`. The digest covers the throttle type and
//! every key part, each preceded by its length, so caller-supplied strings
//! (IPs, tokens, usernames) cannot forge another caller's key by embedding
//! separators, and key length stays bounded.

use sha2::{Digest, Sha256};

pub fn throttle_key(prefix: &str, throttle_type: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(throttle_type.as_bytes());
    for part in parts {
        hasher.update(b":");
        hasher.update(part.len().to_string().as_bytes());
        hasher.update(b":");
        hasher.update(part.as_bytes());
    }

    format!("{}:{}", prefix, hex::encode(hasher.finalize()))
}
