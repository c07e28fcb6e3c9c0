//! Error types shared across Campus Voice.

use crate::issue::IssueId;
use thiserror::Error;

/// Result type for Campus Voice operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by repository, storage and identity operations.
///
/// None of these are fatal: callers report them to the user and let the user
/// retry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// The operation requires a signed-in actor and none is present.
	#[error("operation requires a signed-in user")]
	NotAuthenticated,

	/// The actor is signed in but may not perform the operation.
	#[error("forbidden: {0}")]
	Forbidden(String),

	/// Referenced issue is absent from the durable store.
	#[error("issue not found: {0}")]
	NotFound(IssueId),

	/// Network or store failure reported by an external collaborator.
	#[error("backend unavailable: {0}")]
	BackendUnavailable(String),

	/// Input rejected before reaching storage.
	#[error("validation failed: {0}")]
	Validation(String),

	/// Email/password pair did not match an account.
	#[error("invalid email or password")]
	InvalidCredentials,

	/// Sign-up attempted for an email that already has an account.
	#[error("an account already exists for {0}")]
	AccountExists(String),

	/// Stored data could not be encoded or decoded.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// Local filesystem failure.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Shorthand for a validation failure.
	pub fn validation(message: impl Into<String>) -> Self {
		Self::Validation(message.into())
	}

	/// Shorthand for a permission failure.
	pub fn forbidden(message: impl Into<String>) -> Self {
		Self::Forbidden(message.into())
	}

	/// Shorthand for an unavailable collaborator.
	pub fn unavailable(message: impl Into<String>) -> Self {
		Self::BackendUnavailable(message.into())
	}
}
