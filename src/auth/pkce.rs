//! PKCE verifier/challenge and anti-CSRF state generation (RFC 7636, S256).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use secrecy::SecretString;

/// Random bytes drawn for each verifier/state string.
const RANDOM_BYTES: usize = 48;

/// Challenge method sent alongside `code_challenge`.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Cryptographically secure random string: 48 bytes from the OS-seeded
/// thread RNG, hex-encoded (96 characters, all within the PKCE verifier
/// alphabet).
pub fn generate_random_string() -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of the verifier, base64url-encoded without padding.
pub fn generate_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// In-memory PKCE material for one login attempt. Never persisted.
#[derive(Debug)]
pub struct PkceExchange {
    pub code_verifier: SecretString,
    pub code_challenge: String,
    pub state: String,
}

impl PkceExchange {
    pub fn generate() -> Self {
        let verifier = generate_random_string();
        let code_challenge = generate_code_challenge(&verifier);
        Self {
            code_verifier: SecretString::new(verifier),
            code_challenge,
            state: generate_random_string(),
        }
    }
}
