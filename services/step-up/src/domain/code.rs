//! One-time code generation and salted hashing.

use rand::RngExt;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::domain::types::{OTP_CODE_LEN, OTP_SALT_BYTES};

const CODE_SPACE: u32 = 1_000_000;

/// Uniform 6-digit code, zero-padded, from the thread-local CSPRNG.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    format!(
        "{:0width$}",
        rng.random_range(0..CODE_SPACE),
        width = OTP_CODE_LEN
    )
}

/// Hex-encoded random salt, one per challenge.
pub fn generate_salt() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; OTP_SALT_BYTES] = rng.random();
    hex::encode(bytes)
}

/// Hex SHA-256 over `salt || code`.
pub fn hash_code(salt: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time digest comparison. Only a length mismatch returns early.
pub fn hashes_match(expected: &str, actual: &str) -> bool {
    let (expected, actual) = (expected.as_bytes(), actual.as_bytes());
    if expected.len() != actual.len() {
        return false;
    }
    expected.ct_eq(actual).into()
}

/// Exactly six ASCII digits.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}
