//! Salted password hashing (PBKDF2-HMAC-SHA256, PHC string format).
//!
//! Hashes look like `$pbkdf2-sha256$i=100000,l=32$<salt>$<hash>` so the
//! round count travels with the hash and can be raised without a migration.

use anyhow::{anyhow, Result};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Algorithm, Params, Pbkdf2};
use std::sync::LazyLock;

/// PBKDF2 rounds for newly created hashes.
pub const HASH_ROUNDS: u32 = 100_000;

/// Salt byte length before base64 encoding.
const SALT_BYTES: usize = 16;

/// Derived key length.
const OUTPUT_LEN: usize = 32;

/// Verified against when the username is unknown so both failure paths cost the same.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password("storehouse-dummy-password").unwrap_or_default()
});

/// Hash a password with a fresh random salt and the default round count.
pub fn hash_password(password: &str) -> Result<String> {
    hash_password_with_rounds(password, HASH_ROUNDS)
}

/// Hash a password with an explicit round count (tests use low counts).
pub fn hash_password_with_rounds(password: &str, rounds: u32) -> Result<String> {
    let salt_bytes: [u8; SALT_BYTES] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let params = Params {
        rounds,
        output_length: OUTPUT_LEN,
    };
    let phc = Pbkdf2
        .hash_password_customized(
            password.as_bytes(),
            Some(Algorithm::Pbkdf2Sha256.ident()),
            None,
            params,
            &salt,
        )
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Check a password against a PHC string. Malformed hashes never verify.
pub fn verify_password(phc: &str, password: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Burn the same work as a real verification; used for unknown usernames.
pub fn verify_against_dummy(password: &str) {
    let _ = verify_password(&DUMMY_HASH, password);
}

/// Reject hashes that could never verify (wrong format or algorithm).
pub fn check_phc(phc: &str) -> Result<()> {
    let parsed = PasswordHash::new(phc).map_err(|e| anyhow!("not a PHC string: {e}"))?;
    if parsed.algorithm != Algorithm::Pbkdf2Sha256.ident() {
        return Err(anyhow!(
            "unsupported algorithm '{}', expected pbkdf2-sha256",
            parsed.algorithm
        ));
    }
    Ok(())
}
