//! SHA-256 verification of downloaded artifacts.

use anyhow::{Result, bail};
use log::{debug, warn};
use sha2::{Digest, Sha256};

/// Checksum value that disables verification.
pub const NO_CHECK: &str = "no_check";

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// True only if the SHA-256 of `bytes` equals `expected` (case-insensitive hex).
pub fn verify(bytes: &[u8], expected: &str) -> bool {
    let actual = sha256_hex(bytes);
    debug!("Calculated SHA256: {} ({} bytes)", actual, bytes.len());
    debug!("Expected SHA256:   {}", expected);
    actual.eq_ignore_ascii_case(expected.trim())
}

/// Fails with a mismatch error unless `bytes` hash to `expected`.
///
/// `no_check` skips verification with a warning.
pub fn ensure_checksum(name: &str, bytes: &[u8], expected: &str) -> Result<()> {
    if expected == NO_CHECK {
        warn!("Checksum verification disabled for {}", name);
        return Ok(());
    }
    if !verify(bytes, expected) {
        bail!(
            "Checksum mismatch for {}: expected {}, got {}",
            name,
            expected,
            sha256_hex(bytes)
        );
    }
    debug!("Checksum verified for {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // printf 'hello' | sha256sum
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_sha256_hex() {
        assert_eq!(sha256_hex(b"hello"), HELLO_SHA256);
    }

    #[test]
    fn test_verify_exact_match() {
        assert!(verify(b"hello", HELLO_SHA256));
        assert!(verify(b"hello", &HELLO_SHA256.to_uppercase()));
    }

    #[test]
    fn test_verify_rejects_other_content() {
        assert!(!verify(b"hello!", HELLO_SHA256));
        assert!(!verify(b"", HELLO_SHA256));
        assert!(!verify(b"hello", "PLACEHOLDER_SHA256"));
        assert!(!verify(b"hello", ""));
    }

    #[test]
    fn test_ensure_checksum_mismatch_message() {
        let err = ensure_checksum("rory-terminal", b"tampered", HELLO_SHA256).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Checksum mismatch for rory-terminal"));
        assert!(msg.contains(HELLO_SHA256));
    }

    #[test]
    fn test_ensure_checksum_no_check() {
        assert!(ensure_checksum("rory-terminal", b"anything", NO_CHECK).is_ok());
    }
}
