//! Password hashing and verification.
//!
//! Stored hashes are argon2 PHC strings over `password + salt`, where the salt
//! is a per-account random string kept beside the hash.

use crate::util::random_string;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};

/// Length of the per-account salt appended to the password before hashing.
pub const SALT_CHARS: usize = 30;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HashParams {
    fn to_argon2(self) -> Result<Argon2<'static>, String> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|err| format!("create argon2 params: {err}"))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Generates a fresh account salt.
pub fn new_salt() -> String {
    random_string(SALT_CHARS)
}

/// Hashes `password + salt` with default parameters.
pub fn hash_password(password: &str, salt: &str) -> Result<String, String> {
    hash_password_with_params(password, salt, HashParams::default())
}

pub fn hash_password_with_params(
    password: &str,
    salt: &str,
    params: HashParams,
) -> Result<String, String> {
    let phc_salt = SaltString::generate(&mut OsRng);
    let input = format!("{password}{salt}");
    let hash = params
        .to_argon2()?
        .hash_password(input.as_bytes(), &phc_salt)
        .map_err(|err| format!("hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Checks `candidate + salt` against a stored hash.
///
/// Verification uses the parameters embedded in the hash.
pub fn verify_password(hash: &str, candidate: &str, salt: &str) -> Result<bool, String> {
    let parsed = PasswordHash::new(hash).map_err(|err| format!("parse hash: {err}"))?;
    let input = format!("{candidate}{salt}");
    Ok(Argon2::default()
        .verify_password(input.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::{hash_password_with_params, new_salt, verify_password, HashParams, SALT_CHARS};

    fn fast_params() -> HashParams {
        HashParams {
            memory_kib: 128,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn salted_hash_verifies_only_with_same_salt() {
        let salt = new_salt();
        assert_eq!(salt.len(), SALT_CHARS);

        let hash = hash_password_with_params("secret.pass", &salt, fast_params()).unwrap();

        assert!(verify_password(&hash, "secret.pass", &salt).unwrap());
        assert!(!verify_password(&hash, "secret.pass", "other-salt").unwrap());
        assert!(!verify_password(&hash, "wrong.pass", &salt).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("not-a-phc-string", "x", "y").is_err());
    }
}
