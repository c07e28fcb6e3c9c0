//! Session
//!
//! A [`Session`] owns the signed-in state for one client: the current
//! [`AuthState`], the provider account still waiting for a role, and the
//! [`BackendKind`] chosen at sign-in. It is constructed explicitly and passed by
//! reference; nothing here is global.
//!
//! # Lifecycle
//!
//! 1. [`Session::new`] starts in [`AuthState::Authenticating`].
//! 2. [`Session::init`] resolves the provider's current principal and spawns a
//!    watcher that re-resolves on every principal change.
//! 3. Sign-in operations move the state forward; [`Session::sign_out`] and
//!    [`Session::teardown`] move it back to [`AuthState::Unauthenticated`].
//!
//! Explicit operations and the watcher can race (a sign-in pushes a principal
//! change while the operation is still writing the user record). Every state
//! change carries an epoch; a watcher result computed against an older epoch
//! is discarded.

use crate::account::{Account, AuthService};
use crate::directory::UserDirectory;
use crate::resolver::{IdentityResolver, Resolution};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use voice_core::{BackendKind, Error, Result, Role, User, user::normalize_official_id};

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_CHARS: usize = 6;

/// Authentication state observed by the access gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
	Unauthenticated,
	/// Identity resolution in progress
	Authenticating,
	Authenticated(User),
}

impl AuthState {
	pub fn user(&self) -> Option<&User> {
		match self {
			AuthState::Authenticated(user) => Some(user),
			_ => None,
		}
	}

	pub fn is_authenticating(&self) -> bool {
		matches!(self, AuthState::Authenticating)
	}
}

/// Identity used for demo principals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoProfile {
	pub display_name: String,
	pub email: String,
	/// Fixed uid suffix. Without one every demo sign-in gets a fresh uid.
	pub handle: Option<String>,
}

impl Default for DemoProfile {
	fn default() -> Self {
		Self {
			display_name: "Demo User".to_string(),
			email: "demo@example.com".to_string(),
			handle: None,
		}
	}
}

impl DemoProfile {
	fn uid(&self) -> String {
		match self.handle.as_deref().map(str::trim) {
			Some(handle) if !handle.is_empty() => format!("demo-user-{handle}"),
			_ => format!("demo-user-{}", Utc::now().timestamp_millis()),
		}
	}
}

#[derive(Debug, Clone)]
struct Context {
	epoch: u64,
	backend: BackendKind,
	pending: Option<Account>,
}

struct Snapshot {
	state: AuthState,
	backend: BackendKind,
	pending: Option<Account>,
}

struct Shared {
	auth: Arc<dyn AuthService>,
	resolver: IdentityResolver,
	demo: DemoProfile,
	state: watch::Sender<AuthState>,
	context: RwLock<Context>,
}

impl Shared {
	fn snapshot(&self) -> Snapshot {
		let context = self.context.read();
		Snapshot {
			state: self.state.borrow().clone(),
			backend: context.backend,
			pending: context.pending.clone(),
		}
	}

	/// Publishes a new state. With `expected` set, the change is dropped if any
	/// other change landed since that epoch was read. Without it the change is
	/// unconditional and starts a new epoch.
	fn apply(&self, expected: Option<u64>, next: Snapshot) -> bool {
		let mut context = self.context.write();
		match expected {
			Some(epoch) if epoch != context.epoch => return false,
			Some(_) => {}
			None => context.epoch += 1,
		}
		context.backend = next.backend;
		context.pending = next.pending;
		self.state.send_replace(next.state);
		true
	}

	fn authenticated(&self, user: User, backend: BackendKind) {
		tracing::info!(uid = %user.uid, role = %user.role, ?backend, "Session authenticated");
		self.apply(
			None,
			Snapshot {
				state: AuthState::Authenticated(user),
				backend,
				pending: None,
			},
		);
	}

	fn signed_out() -> Snapshot {
		Snapshot {
			state: AuthState::Unauthenticated,
			backend: BackendKind::Durable,
			pending: None,
		}
	}

	/// Re-resolves `account` on behalf of the watcher.
	async fn refresh(&self, account: Option<Account>) {
		let (epoch, backend) = {
			let context = self.context.read();
			(context.epoch, context.backend)
		};

		let next = match account {
			// Demo principals are not tied to the provider
			None if backend == BackendKind::Local => return,
			None => Self::signed_out(),
			Some(account) => match self.resolver.resolve(&account).await {
				Ok(Resolution::Known(user)) => Snapshot {
					state: AuthState::Authenticated(user),
					backend: BackendKind::Durable,
					pending: None,
				},
				Ok(Resolution::NeedsRole(account)) => Snapshot {
					state: AuthState::Unauthenticated,
					backend: BackendKind::Durable,
					pending: Some(account),
				},
				Err(e) => {
					tracing::error!(error = %e, uid = %account.uid, "Identity resolution failed");
					Self::signed_out()
				}
			},
		};

		if !self.apply(Some(epoch), next) {
			tracing::debug!("Discarding superseded identity resolution");
		}
	}
}

/// Signed-in state for one client.
pub struct Session {
	shared: Arc<Shared>,
	watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
	pub fn new(auth: Arc<dyn AuthService>, directory: Arc<dyn UserDirectory>) -> Self {
		let (state, _) = watch::channel(AuthState::Authenticating);
		Self {
			shared: Arc::new(Shared {
				auth,
				resolver: IdentityResolver::new(directory),
				demo: DemoProfile::default(),
				state,
				context: RwLock::new(Context {
					epoch: 0,
					backend: BackendKind::Durable,
					pending: None,
				}),
			}),
			watcher: Mutex::new(None),
		}
	}

	/// Replaces the identity used by [`Session::sign_in_demo`].
	///
	/// Must be called before the session is shared.
	pub fn with_demo_profile(mut self, demo: DemoProfile) -> Self {
		if let Some(shared) = Arc::get_mut(&mut self.shared) {
			shared.demo = demo;
		} else {
			tracing::warn!("Demo profile ignored: session already initialized");
		}
		self
	}

	/// Resolves the provider's current principal and starts watching for
	/// principal changes. Calling it again restarts the watcher.
	pub async fn init(&self) {
		let mut changes = self.shared.auth.principal_changes();
		let current = changes.borrow_and_update().clone();
		self.shared.refresh(current).await;

		let shared = self.shared.clone();
		let handle = tokio::spawn(async move {
			while changes.changed().await.is_ok() {
				let account = changes.borrow_and_update().clone();
				shared.refresh(account).await;
			}
			tracing::debug!("Principal watcher stopped");
		});

		if let Some(previous) = self.watcher.lock().replace(handle) {
			previous.abort();
		}
	}

	/// Stops the watcher and signs out.
	pub async fn teardown(&self) -> Result<()> {
		if let Some(handle) = self.watcher.lock().take() {
			handle.abort();
		}
		self.sign_out().await
	}

	/// Whether the principal watcher is running.
	pub fn is_watching(&self) -> bool {
		self.watcher.lock().as_ref().is_some_and(|handle| !handle.is_finished())
	}

	/// Re-resolves the provider's current principal now.
	pub async fn refresh(&self) {
		let account = self.shared.auth.current_account();
		self.shared.refresh(account).await;
	}

	/// Federated sign-in that records `role` for the principal, replacing any
	/// role chosen before.
	pub async fn sign_in_federated(&self, role: Role, official_id: Option<String>) -> Result<User> {
		let official_id = normalize_official_id(role, official_id)?;
		let result = self
			.attempt(async {
				let account = self.shared.auth.sign_in_federated().await?;
				self.shared.resolver.register(&account, role, official_id).await
			})
			.await;

		result.inspect(|user| self.shared.authenticated(user.clone(), BackendKind::Durable))
	}

	/// Email/password sign-in.
	///
	/// A principal without a user record stays unauthenticated; its account is
	/// kept as [`Session::pending_account`] until [`Session::update_role`]
	/// completes the registration.
	pub async fn sign_in_password(&self, email: &str, password: &str) -> Result<Resolution> {
		let resolution = self
			.attempt(async {
				let account = self.shared.auth.sign_in_password(email, password).await?;
				self.shared.resolver.resolve(&account).await
			})
			.await?;

		match &resolution {
			Resolution::Known(user) => self.shared.authenticated(user.clone(), BackendKind::Durable),
			Resolution::NeedsRole(account) => {
				tracing::info!(uid = %account.uid, "Signed in without a role");
				self.shared.apply(
					None,
					Snapshot {
						state: AuthState::Unauthenticated,
						backend: BackendKind::Durable,
						pending: Some(account.clone()),
					},
				);
			}
		}
		Ok(resolution)
	}

	/// Creates an email/password account with `role` and signs it in.
	pub async fn sign_up_password(
		&self,
		email: &str,
		password: &str,
		role: Role,
		display_name: &str,
		official_id: Option<String>,
	) -> Result<User> {
		if password.chars().count() < MIN_PASSWORD_CHARS {
			return Err(Error::validation(format!(
				"password must be at least {MIN_PASSWORD_CHARS} characters"
			)));
		}
		let display_name = display_name.trim();
		if display_name.is_empty() {
			return Err(Error::validation("display name must not be empty"));
		}
		let official_id = normalize_official_id(role, official_id)?;

		let result = self
			.attempt(async {
				let account = self
					.shared
					.auth
					.sign_up_password(email, password, display_name)
					.await?
					.with_display_name(display_name);
				self.shared.resolver.register(&account, role, official_id).await
			})
			.await;

		result.inspect(|user| self.shared.authenticated(user.clone(), BackendKind::Durable))
	}

	/// Signs in a demo principal backed by the local cache.
	///
	/// Any provider session is ended first. The demo user is never written to
	/// the user directory.
	pub async fn sign_in_demo(&self, role: Role, official_id: Option<String>) -> Result<User> {
		let demo = &self.shared.demo;
		let user = User::new(demo.uid(), &demo.email, &demo.display_name, role, official_id)?;

		if self.shared.auth.current_account().is_some() {
			self.shared.auth.sign_out().await?;
		}
		self.shared.authenticated(user.clone(), BackendKind::Local);
		Ok(user)
	}

	/// Records a new role for the current principal.
	///
	/// For a provider principal this writes the user record, which also
	/// completes a pending registration. A demo principal changes role in
	/// place.
	pub async fn update_role(&self, role: Role, official_id: Option<String>) -> Result<User> {
		let snapshot = self.shared.snapshot();
		if snapshot.backend == BackendKind::Local
			&& let AuthState::Authenticated(current) = snapshot.state
		{
			let user = User {
				role,
				official_id: normalize_official_id(role, official_id)?,
				..current
			};
			self.shared.authenticated(user.clone(), BackendKind::Local);
			return Ok(user);
		}

		let account = self
			.shared
			.auth
			.current_account()
			.ok_or(Error::NotAuthenticated)?;
		let user = self.shared.resolver.register(&account, role, official_id).await?;
		self.shared.authenticated(user.clone(), BackendKind::Durable);
		Ok(user)
	}

	/// Ends the session. Demo sessions never touch the provider.
	pub async fn sign_out(&self) -> Result<()> {
		if self.shared.auth.current_account().is_some() {
			self.shared.auth.sign_out().await?;
		}
		if let Some(user) = self.current_user() {
			tracing::info!(uid = %user.uid, "Signed out");
		}
		self.shared.apply(None, Shared::signed_out());
		Ok(())
	}

	pub fn state(&self) -> AuthState {
		self.shared.state.borrow().clone()
	}

	/// Receiver that observes every state change.
	pub fn watch_state(&self) -> watch::Receiver<AuthState> {
		self.shared.state.subscribe()
	}

	pub fn current_user(&self) -> Option<User> {
		self.shared.state.borrow().user().cloned()
	}

	/// Backend the signed-in principal reads and writes.
	pub fn backend_kind(&self) -> BackendKind {
		self.shared.context.read().backend
	}

	/// Provider account signed in without a role yet.
	pub fn pending_account(&self) -> Option<Account> {
		self.shared.context.read().pending.clone()
	}

	/// Runs a provider round-trip in [`AuthState::Authenticating`], restoring
	/// the previous state if it fails.
	async fn attempt<T, F>(&self, operation: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		let previous = self.shared.snapshot();
		self.shared.apply(
			None,
			Snapshot {
				state: AuthState::Authenticating,
				backend: previous.backend,
				pending: previous.pending.clone(),
			},
		);

		let result = operation.await;
		if let Err(e) = &result {
			tracing::warn!(error = %e, "Sign-in attempt failed");
			self.shared.apply(None, previous);
		}
		result
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		if let Some(handle) = self.watcher.get_mut().take() {
			handle.abort();
		}
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("state", &*self.shared.state.borrow())
			.field("backend", &self.backend_kind())
			.finish_non_exhaustive()
	}
}
