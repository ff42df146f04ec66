//! Password hashing port.

use crate::Result;

/// Hashes and verifies user passwords.
///
/// Implementations must salt every call: hashing the same password twice
/// yields different strings, both of which verify.
pub trait PasswordHasher: Send + Sync {
  fn hash(&self, plaintext: &str) -> Result<String>;

  /// `false` for a mismatch and for a hash the implementation cannot parse.
  fn verify(&self, hash: &str, plaintext: &str) -> bool;
}
