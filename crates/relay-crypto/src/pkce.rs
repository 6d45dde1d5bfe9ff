//! PKCE (RFC 7636) verifier/challenge generation and validation.
//!
//! Grounded on `original_source/.../auth/oauth_pkce.py`: 32 random bytes,
//! base64url without padding for the verifier, SHA-256 + base64url for the
//! challenge, and a verifier charset/length check per RFC 7636 §4.1.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const VERIFIER_MIN_LEN: usize = 43;
const VERIFIER_MAX_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PkceError {
    #[error("code verifier length {0} is outside the allowed range [{VERIFIER_MIN_LEN}, {VERIFIER_MAX_LEN}]")]
    InvalidLength(usize),

    #[error("code verifier contains a character outside the unreserved RFC 7636 alphabet")]
    InvalidCharset,
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// Generates a fresh PKCE code verifier: 32 random bytes, base64url (no pad).
/// This always yields a 43-character string, satisfying the length bound.
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Derives the S256 code challenge for a verifier.
pub fn generate_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Validates a verifier's length and character set per RFC 7636 §4.1.
pub fn validate_code_verifier(verifier: &str) -> Result<(), PkceError> {
    let len = verifier.chars().count();
    if !(VERIFIER_MIN_LEN..=VERIFIER_MAX_LEN).contains(&len) {
        return Err(PkceError::InvalidLength(len));
    }
    if !verifier.chars().all(is_unreserved) {
        return Err(PkceError::InvalidCharset);
    }
    Ok(())
}

/// True iff `challenge` is the S256 challenge for `verifier`.
pub fn verify_challenge(verifier: &str, challenge: &str) -> bool {
    generate_code_challenge(verifier) == challenge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_verifier_is_valid() {
        let verifier = generate_code_verifier();
        assert!(validate_code_verifier(&verifier).is_ok());
        assert_eq!(verifier.len(), 43);
    }

    #[test]
    fn challenge_round_trips_for_any_valid_verifier() {
        for _ in 0..20 {
            let verifier = generate_code_verifier();
            let challenge = generate_code_challenge(&verifier);
            assert!(verify_challenge(&verifier, &challenge));
        }
    }

    #[test]
    fn bit_flip_in_verifier_fails_verification() {
        let verifier = generate_code_verifier();
        let challenge = generate_code_challenge(&verifier);
        let mut flipped = verifier.clone();
        let idx = 0;
        let ch = flipped.remove(idx);
        let replacement = if ch == 'a' { 'b' } else { 'a' };
        flipped.insert(idx, replacement);
        assert!(!verify_challenge(&flipped, &challenge));
    }

    #[test]
    fn bit_flip_in_challenge_fails_verification() {
        let verifier = generate_code_verifier();
        let mut challenge = generate_code_challenge(&verifier);
        let idx = 0;
        let ch = challenge.remove(idx);
        let replacement = if ch == 'a' { 'b' } else { 'a' };
        challenge.insert(idx, replacement);
        assert!(!verify_challenge(&verifier, &challenge));
    }

    #[test]
    fn too_short_verifier_is_rejected() {
        assert_eq!(
            validate_code_verifier(&"a".repeat(42)),
            Err(PkceError::InvalidLength(42))
        );
    }

    #[test]
    fn too_long_verifier_is_rejected() {
        assert_eq!(
            validate_code_verifier(&"a".repeat(129)),
            Err(PkceError::InvalidLength(129))
        );
    }

    #[test]
    fn invalid_charset_is_rejected() {
        let verifier = "a".repeat(42) + "!";
        assert_eq!(
            validate_code_verifier(&verifier),
            Err(PkceError::InvalidCharset)
        );
    }
}
