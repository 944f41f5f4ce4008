//! Session token generation and secret hashing.
//!
//! Admin session tokens are 256-bit random values. Only their salted
//! SHA-256 hash is stored; lookups hash the presented token first.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Visible prefix on every admin session token.
pub const SESSION_TOKEN_PREFIX: &str = "afs_";

/// Number of token characters kept for display (prefix included).
const DISPLAY_PREFIX_LEN: usize = 12;

/// Generate a new admin session token: `afs_` + 64 hex chars.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", SESSION_TOKEN_PREFIX, hex::encode(bytes))
}

/// Short, non-secret prefix of a token for listings.
pub fn token_display_prefix(token: &str) -> String {
    token.chars().take(DISPLAY_PREFIX_LEN).collect()
}

/// Hash a secret for database lookups.
/// Uses SHA-256 with application salt, returns lowercase hex string.
pub fn hash_secret(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"appforge-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time string comparison for credentials.
///
/// Length is compared first; lengths are not treated as secret.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
