//! Users and roles

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Application role chosen at first sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// Submits and votes on issues
	Student,
	/// Triages issues
	Admin,
	/// Triages issues
	Management,
}

impl Role {
	/// All roles in display order.
	pub const ALL: [Role; 3] = [Role::Student, Role::Admin, Role::Management];

	/// Lowercase identifier used on the wire.
	pub fn as_str(self) -> &'static str {
		match self {
			Role::Student => "student",
			Role::Admin => "admin",
			Role::Management => "management",
		}
	}

	/// Whether this role triages issues (admin or management).
	pub fn is_staff(self) -> bool {
		matches!(self, Role::Admin | Role::Management)
	}

	/// Landing route for a signed-in user of this role.
	///
	/// # Examples
	///
	/// ```
	/// use voice_core::Role;
	///
	/// assert_eq!(Role::Student.home_path(), "/dashboard");
	/// assert_eq!(Role::Management.home_path(), "/admin");
	/// ```
	pub fn home_path(self) -> &'static str {
		if self.is_staff() { "/admin" } else { "/dashboard" }
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"student" => Ok(Role::Student),
			"admin" => Ok(Role::Admin),
			"management" => Ok(Role::Management),
			other => Err(Error::validation(format!("unknown role: {other}"))),
		}
	}
}

/// Where a principal's issue data is read from and written to.
///
/// Chosen once when the session signs in and never mixed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
	/// Shared durable store, visible to every device
	#[default]
	Durable,
	/// On-device cache used by demo principals
	Local,
}

/// A resolved application user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
	pub uid: String,
	pub email: String,
	pub display_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub photo_url: Option<String>,
	pub role: Role,
	/// Accountability id, present exactly when the role is a staff role.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub official_id: Option<String>,
	pub created_at: DateTime<Utc>,
}

impl User {
	/// Builds a user record, enforcing the official id rule.
	///
	/// Staff roles must carry a non-blank official id. Students never keep
	/// one, even when a value is supplied.
	///
	/// # Examples
	///
	/// ```
	/// use voice_core::{Role, User};
	///
	/// let admin = User::new("u1", "a@campus.edu", "Ada", Role::Admin, Some("EMP-7".into())).unwrap();
	/// assert_eq!(admin.official_id.as_deref(), Some("EMP-7"));
	///
	/// let student = User::new("u2", "s@campus.edu", "Sam", Role::Student, Some("ignored".into())).unwrap();
	/// assert!(student.official_id.is_none());
	///
	/// assert!(User::new("u3", "m@campus.edu", "Max", Role::Management, None).is_err());
	/// ```
	pub fn new(
		uid: impl Into<String>,
		email: impl Into<String>,
		display_name: impl Into<String>,
		role: Role,
		official_id: Option<String>,
	) -> Result<Self> {
		Ok(Self {
			uid: uid.into(),
			email: email.into(),
			display_name: display_name.into(),
			photo_url: None,
			role,
			official_id: normalize_official_id(role, official_id)?,
			created_at: Utc::now(),
		})
	}

	/// Sets the avatar reference.
	pub fn with_photo_url(mut self, photo_url: Option<String>) -> Self {
		self.photo_url = photo_url;
		self
	}

	/// Whether this user triages issues.
	pub fn is_staff(&self) -> bool {
		self.role.is_staff()
	}
}

/// Applies the official id rule for `role`.
pub fn normalize_official_id(role: Role, official_id: Option<String>) -> Result<Option<String>> {
	if !role.is_staff() {
		return Ok(None);
	}

	match official_id.map(|id| id.trim().to_string()) {
		Some(id) if !id.is_empty() => Ok(Some(id)),
		_ => Err(Error::validation(format!(
			"an official id is required for {role} accounts"
		))),
	}
}
