//! Identity & role resolution

use crate::account::Account;
use crate::directory::UserDirectory;
use std::sync::Arc;
use voice_core::{Result, Role, User};

/// Outcome of resolving a provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
	/// The account has a user record.
	Known(User),
	/// Signed in with the provider but no role was ever chosen.
	NeedsRole(Account),
}

impl Resolution {
	pub fn user(&self) -> Option<&User> {
		match self {
			Resolution::Known(user) => Some(user),
			Resolution::NeedsRole(_) => None,
		}
	}
}

/// Maps provider accounts to application users.
#[derive(Clone)]
pub struct IdentityResolver {
	directory: Arc<dyn UserDirectory>,
}

impl IdentityResolver {
	pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
		Self { directory }
	}

	/// Looks up the user record for `account`.
	///
	/// Contact details come from the provider; the display name prefers the
	/// stored record, which is what the user typed at sign-up.
	pub async fn resolve(&self, account: &Account) -> Result<Resolution> {
		let Some(record) = self.directory.get(&account.uid).await? else {
			tracing::debug!(uid = %account.uid, "No user record, role selection required");
			return Ok(Resolution::NeedsRole(account.clone()));
		};

		let display_name = if record.display_name.is_empty() {
			account.display_name.clone().unwrap_or_default()
		} else {
			record.display_name
		};

		Ok(Resolution::Known(User {
			uid: account.uid.clone(),
			email: account.email.clone(),
			display_name,
			photo_url: account.photo_url.clone(),
			..record
		}))
	}

	/// Creates or overwrites the user record for `account` with `role`.
	pub async fn register(&self, account: &Account, role: Role, official_id: Option<String>) -> Result<User> {
		let user = User::new(
			account.uid.clone(),
			account.email.clone(),
			account.display_name.clone().unwrap_or_default(),
			role,
			official_id,
		)?
		.with_photo_url(account.photo_url.clone());

		self.directory.put(user.clone()).await?;
		tracing::info!(uid = %user.uid, role = %user.role, "User record written");
		Ok(user)
	}
}

impl std::fmt::Debug for IdentityResolver {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IdentityResolver").finish_non_exhaustive()
	}
}
