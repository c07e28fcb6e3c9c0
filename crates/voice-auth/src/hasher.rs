//! Password hashing

use voice_core::{Error, Result};

/// Hashes and verifies account passwords.
pub trait PasswordHasher: Send + Sync {
	/// Hashes `password` with a fresh salt.
	fn hash(&self, password: &str) -> Result<String>;

	/// Checks `password` against a hash produced by [`PasswordHasher::hash`].
	///
	/// A mismatch is `Ok(false)`; only a malformed hash is an error.
	fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

/// Argon2id with default parameters.
///
/// # Examples
///
/// ```
/// use voice_auth::{Argon2Hasher, PasswordHasher};
///
/// let hasher = Argon2Hasher::new();
/// let hash = hasher.hash("hunter22").unwrap();
///
/// assert!(hasher.verify("hunter22", &hash).unwrap());
/// assert!(!hasher.verify("hunter23", &hash).unwrap());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
	pub fn new() -> Self {
		Self
	}
}

impl PasswordHasher for Argon2Hasher {
	fn hash(&self, password: &str) -> Result<String> {
		use argon2::{
			Argon2,
			password_hash::{PasswordHasher as _, SaltString},
		};
		use rand::RngCore;

		let mut salt_bytes = [0u8; 16];
		rand::rng().fill_bytes(&mut salt_bytes);
		let salt = SaltString::encode_b64(&salt_bytes)
			.map_err(|e| Error::unavailable(format!("password hashing failed: {e}")))?;

		Argon2::default()
			.hash_password(password.as_bytes(), &salt)
			.map(|hash| hash.to_string())
			.map_err(|e| Error::unavailable(format!("password hashing failed: {e}")))
	}

	fn verify(&self, password: &str, hash: &str) -> Result<bool> {
		use argon2::{
			Argon2,
			password_hash::{PasswordHash, PasswordVerifier},
		};

		let parsed = PasswordHash::new(hash)
			.map_err(|e| Error::unavailable(format!("stored password hash is unreadable: {e}")))?;

		Ok(Argon2::default()
			.verify_password(password.as_bytes(), &parsed)
			.is_ok())
	}
}
