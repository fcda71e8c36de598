//! PKCE (RFC 7636) generation and verification, S256 only.
//!
//! The client generates a verifier/challenge pair per authorization attempt;
//! the authorization server verifies the challenge at code exchange.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A PKCE verifier/challenge pair.
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// The secret held by the client until code exchange (43 chars).
    pub verifier: String,

    /// `BASE64URL(SHA256(verifier))`, sent with the authorization request.
    pub challenge: String,
}

/// Generate a fresh PKCE pair from 32 random bytes.
#[must_use]
pub fn generate() -> PkcePair {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    PkcePair { verifier, challenge }
}

/// Generate an opaque state nonce (16 random bytes, base64url).
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Verify a PKCE code_verifier against the stored S256 code_challenge.
#[must_use]
pub fn verify_s256(verifier: &str, challenge: &str) -> bool {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest) == challenge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert!(verify_s256(verifier, challenge));
    }

    #[test]
    fn test_wrong_verifier_rejected() {
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert!(!verify_s256("not-the-right-verifier", challenge));
        assert!(!verify_s256("", challenge));
    }

    #[test]
    fn test_generated_pair_verifies() {
        let pair = generate();
        assert!(verify_s256(&pair.verifier, &pair.challenge));
    }

    #[test]
    fn test_generated_pairs_are_distinct() {
        let a = generate();
        let b = generate();
        assert_ne!(a.verifier, b.verifier);
        assert!(!verify_s256(&a.verifier, &b.challenge));
    }

    #[test]
    fn test_verifier_shape() {
        let pair = generate();
        // 32 bytes base64url without padding
        assert_eq!(pair.verifier.len(), 43);
        assert!(
            pair.verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_state_shape() {
        let state = generate_state();
        assert_eq!(state.len(), 22);
        assert_ne!(state, generate_state());
    }
}
