/// Password hashing and verification using Argon2id
use crate::error::{IdentityError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Argon2 time cost (iterations) used when none is configured
pub const DEFAULT_HASH_COST: u32 = 5;

/// Longest secret accepted for hashing, in bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

fn hasher(cost: u32) -> Result<Argon2<'static>> {
    let params = Params::new(
        Params::DEFAULT_M_COST,
        cost,
        Params::DEFAULT_P_COST,
        None,
    )
    .map_err(|e| IdentityError::Hashing(format!("Unsupported hash cost {}: {}", cost, e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password using Argon2id
///
/// ## Security
///
/// - Algorithm: Argon2id, time cost `cost`, default memory and parallelism
/// - Salt: Random 16-byte salt generated per call
/// - Output: PHC string embedding algorithm, parameters, salt and digest
///
/// ## Errors
///
/// Returns `IdentityError::Hashing` if:
/// - `password` is longer than [`MAX_PASSWORD_BYTES`]
/// - `cost` is outside the range Argon2 supports
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(IdentityError::Hashing(format!(
            "Password exceeds {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }

    let salt = SaltString::generate(&mut OsRng);

    let password_hash = hasher(cost)?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| IdentityError::Hashing(format!("Password hashing failed: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its hash
///
/// ## Security
///
/// - Constant-time digest comparison
/// - Parameters are read from the PHC string, so hashes made with any cost verify
///
/// ## Returns
///
/// `Ok(true)` on match, `Ok(false)` on mismatch. A hash that cannot be parsed
/// or names an unsupported algorithm is an error, not a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| IdentityError::Hashing(format!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(IdentityError::Hashing(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}
