//! Identity provider
//!
//! An [`Account`] is what the provider knows about a principal: a stable uid
//! and contact details, but no application role. Roles live in the
//! [`UserDirectory`](crate::UserDirectory).

use crate::hasher::{Argon2Hasher, PasswordHasher};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use uuid::Uuid;
use voice_core::{Error, Result};

/// Principal as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
	pub uid: String,
	pub email: String,
	pub display_name: Option<String>,
	pub photo_url: Option<String>,
}

impl Account {
	pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
		Self {
			uid: uid.into(),
			email: email.into(),
			display_name: None,
			photo_url: None,
		}
	}

	pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
		self.display_name = Some(display_name.into());
		self
	}

	pub fn with_photo_url(mut self, photo_url: impl Into<String>) -> Self {
		self.photo_url = Some(photo_url.into());
		self
	}
}

/// Identity provider contract.
///
/// Every successful sign-in, sign-up or sign-out is also pushed to the
/// receivers handed out by [`AuthService::principal_changes`].
#[async_trait]
pub trait AuthService: Send + Sync {
	/// Interactive sign-in with the federated provider.
	async fn sign_in_federated(&self) -> Result<Account>;

	/// Email/password sign-in.
	async fn sign_in_password(&self, email: &str, password: &str) -> Result<Account>;

	/// Creates an email/password account and signs it in.
	async fn sign_up_password(&self, email: &str, password: &str, display_name: &str) -> Result<Account>;

	/// Ends the provider session.
	async fn sign_out(&self) -> Result<()>;

	/// The principal currently signed in with the provider.
	fn current_account(&self) -> Option<Account>;

	/// Receiver that observes every principal change.
	fn principal_changes(&self) -> watch::Receiver<Option<Account>>;
}

struct PasswordAccount {
	account: Account,
	password_hash: String,
}

/// In-process identity provider.
///
/// Password accounts are keyed by lowercased email. Federated sign-in returns
/// the identity configured with [`MemoryAuthService::with_federated_identity`];
/// without one it fails as if the user closed the provider prompt.
pub struct MemoryAuthService {
	accounts: RwLock<HashMap<String, PasswordAccount>>,
	federated: RwLock<Option<Account>>,
	principal: watch::Sender<Option<Account>>,
	hasher: Box<dyn PasswordHasher>,
	available: AtomicBool,
}

impl Default for MemoryAuthService {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryAuthService {
	pub fn new() -> Self {
		let (principal, _) = watch::channel(None);
		Self {
			accounts: RwLock::new(HashMap::new()),
			federated: RwLock::new(None),
			principal,
			hasher: Box::new(Argon2Hasher::new()),
			available: AtomicBool::new(true),
		}
	}

	/// Identity returned by federated sign-in.
	pub fn with_federated_identity(self, account: Account) -> Self {
		*self.federated.write() = Some(account);
		self
	}

	/// Replaces the password hasher.
	pub fn with_hasher(mut self, hasher: impl PasswordHasher + 'static) -> Self {
		self.hasher = Box::new(hasher);
		self
	}

	/// Simulates the provider becoming unreachable.
	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	fn ensure_available(&self) -> Result<()> {
		if self.available.load(Ordering::SeqCst) {
			Ok(())
		} else {
			Err(Error::unavailable("identity provider is unreachable"))
		}
	}

	fn publish(&self, account: Option<Account>) {
		self.principal.send_replace(account);
	}
}

#[async_trait]
impl AuthService for MemoryAuthService {
	async fn sign_in_federated(&self) -> Result<Account> {
		self.ensure_available()?;
		let account = self
			.federated
			.read()
			.clone()
			.ok_or_else(|| Error::unavailable("federated sign-in was cancelled"))?;

		tracing::info!(uid = %account.uid, "Federated sign-in");
		self.publish(Some(account.clone()));
		Ok(account)
	}

	async fn sign_in_password(&self, email: &str, password: &str) -> Result<Account> {
		self.ensure_available()?;
		let key = email.trim().to_lowercase();
		let account = {
			let accounts = self.accounts.read();
			let stored = accounts.get(&key).ok_or(Error::InvalidCredentials)?;
			if !self.hasher.verify(password, &stored.password_hash)? {
				return Err(Error::InvalidCredentials);
			}
			stored.account.clone()
		};

		tracing::info!(uid = %account.uid, "Password sign-in");
		self.publish(Some(account.clone()));
		Ok(account)
	}

	async fn sign_up_password(&self, email: &str, password: &str, display_name: &str) -> Result<Account> {
		self.ensure_available()?;
		let key = email.trim().to_lowercase();
		if key.is_empty() {
			return Err(Error::validation("email must not be empty"));
		}
		let password_hash = self.hasher.hash(password)?;

		let account = {
			let mut accounts = self.accounts.write();
			if accounts.contains_key(&key) {
				return Err(Error::AccountExists(key));
			}
			let account = Account::new(Uuid::new_v4().simple().to_string(), key.clone())
				.with_display_name(display_name);
			accounts.insert(
				key,
				PasswordAccount {
					account: account.clone(),
					password_hash,
				},
			);
			account
		};

		tracing::info!(uid = %account.uid, "Password account created");
		self.publish(Some(account.clone()));
		Ok(account)
	}

	async fn sign_out(&self) -> Result<()> {
		self.ensure_available()?;
		self.publish(None);
		Ok(())
	}

	fn current_account(&self) -> Option<Account> {
		self.principal.borrow().clone()
	}

	fn principal_changes(&self) -> watch::Receiver<Option<Account>> {
		self.principal.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	#[fixture]
	fn service() -> MemoryAuthService {
		MemoryAuthService::new()
	}

	#[rstest]
	#[tokio::test]
	async fn test_sign_up_then_sign_in(service: MemoryAuthService) {
		let created = service
			.sign_up_password("Ada@Campus.edu", "secret1", "Ada")
			.await
			.unwrap();
		service.sign_out().await.unwrap();

		let signed_in = service.sign_in_password("ada@campus.edu", "secret1").await.unwrap();

		assert_eq!(created.uid, signed_in.uid);
		assert_eq!(signed_in.display_name.as_deref(), Some("Ada"));
		assert_eq!(service.current_account(), Some(signed_in));
	}

	#[rstest]
	#[case("ada@campus.edu", "wrong-password")]
	#[case("nobody@campus.edu", "secret1")]
	#[tokio::test]
	async fn test_bad_credentials(service: MemoryAuthService, #[case] email: &str, #[case] password: &str) {
		service.sign_up_password("ada@campus.edu", "secret1", "Ada").await.unwrap();

		let result = service.sign_in_password(email, password).await;

		assert!(matches!(result, Err(Error::InvalidCredentials)));
	}

	#[rstest]
	#[tokio::test]
	async fn test_duplicate_sign_up(service: MemoryAuthService) {
		service.sign_up_password("ada@campus.edu", "secret1", "Ada").await.unwrap();

		let result = service.sign_up_password("ADA@campus.edu", "secret2", "Ada").await;

		assert!(matches!(result, Err(Error::AccountExists(email)) if email == "ada@campus.edu"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_federated_without_identity_fails(service: MemoryAuthService) {
		assert!(matches!(
			service.sign_in_federated().await,
			Err(Error::BackendUnavailable(_))
		));
	}

	#[tokio::test]
	async fn test_principal_changes_are_pushed() {
		let service = MemoryAuthService::new()
			.with_federated_identity(Account::new("fed-1", "f@campus.edu").with_display_name("Fay"));
		let mut changes = service.principal_changes();

		service.sign_in_federated().await.unwrap();
		changes.changed().await.unwrap();
		assert_eq!(changes.borrow_and_update().as_ref().map(|a| a.uid.clone()), Some("fed-1".into()));

		service.sign_out().await.unwrap();
		changes.changed().await.unwrap();
		assert!(changes.borrow().is_none());
	}
}
