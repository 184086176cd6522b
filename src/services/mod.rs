pub mod chat;
pub mod dispatch;
pub mod editor;
pub mod history;
pub mod quota;
pub mod store;

use std::fmt::Write;

use sha2::{Digest, Sha256};

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Short SHA-256 fingerprint of a secret, safe to log.
pub(crate) fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    bytes_to_hex(&digest[..4])
}
