//! Argon2 implementation of the password-hasher port.

use argon2::{
  Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier, password_hash::SaltString,
};
use rand_core::OsRng;
use shelf_core::{Error, Result, password::PasswordHasher};

/// Argon2id with the crate's default parameters, producing PHC strings such
/// as `$argon2id$v=19$…`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
  fn hash(&self, plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(plaintext.as_bytes(), &salt)
      .map(|hash| hash.to_string())
      .map_err(|e| Error::Hashing(e.to_string()))
  }

  fn verify(&self, hash: &str, plaintext: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
      return false;
    };
    Argon2::default()
      .verify_password(plaintext.as_bytes(), &parsed)
      .is_ok()
  }
}
