//! Application wiring
//!
//! [`App`] owns one [`Session`] and both storage backends. Each call to
//! [`App::repository`] returns an [`IssueRepository`] bound to the backend the
//! session signed in with, so demo principals never touch the durable store.

use std::sync::Arc;
use voice_auth::{AccessGate, AuthService, Decision, MemoryAuthService, MemoryUserDirectory, Session, UserDirectory};
use voice_conf::Settings;
use voice_core::{BackendKind, Result, User};
use voice_issues::IssueRepository;
use voice_store::{FileCache, LocalBackend, MemoryIssueStore, RemoteBackend, StorageBackend, StorageBackends};

pub struct App {
	settings: Settings,
	session: Session,
	backends: StorageBackends,
	gate: AccessGate,
}

impl App {
	/// Wires `settings` to the given identity provider, user directory and
	/// durable backend. The local backend is a [`FileCache`] under
	/// `storage.cache_dir`.
	pub fn new(
		settings: Settings,
		auth: Arc<dyn AuthService>,
		directory: Arc<dyn UserDirectory>,
		durable: Arc<dyn StorageBackend>,
	) -> Self {
		let local = Arc::new(LocalBackend::with_slot(
			FileCache::new(settings.storage.cache_dir.clone()),
			settings.storage.slot.clone(),
		));
		let session = Session::new(auth, directory).with_demo_profile(settings.demo.profile());

		Self {
			backends: StorageBackends::new(durable, local),
			session,
			gate: AccessGate::application(),
			settings,
		}
	}

	/// Uses in-process services for everything but the local cache.
	pub fn in_memory(settings: Settings) -> Self {
		Self::new(
			settings,
			Arc::new(MemoryAuthService::new()),
			Arc::new(MemoryUserDirectory::new()),
			Arc::new(RemoteBackend::new(MemoryIssueStore::new())),
		)
	}

	/// Starts watching the identity provider.
	pub async fn start(&self) {
		self.session.init().await;
		tracing::debug!(policy = %self.settings.policy, "Application started");
	}

	/// Signs out and stops the session's watcher.
	pub async fn shutdown(&self) -> Result<()> {
		self.session.teardown().await
	}

	/// Signs in as the configured demo principal.
	pub async fn sign_in_demo(&self) -> Result<User> {
		let demo = &self.settings.demo;
		self.session
			.sign_in_demo(demo.role, demo.official_id.clone())
			.await
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn session(&self) -> &Session {
		&self.session
	}

	pub fn gate(&self) -> &AccessGate {
		&self.gate
	}

	pub fn current_user(&self) -> Option<User> {
		self.session.current_user()
	}

	pub fn backend_kind(&self) -> BackendKind {
		self.session.backend_kind()
	}

	/// Repository over the session's backend, enforcing the configured policy.
	pub fn repository(&self) -> IssueRepository {
		IssueRepository::new(self.backends.select(self.session.backend_kind()))
			.with_policy(self.settings.policy)
	}

	/// Evaluates a navigation for the current session state.
	pub fn navigate(&self, path: &str) -> Decision {
		self.gate.evaluate(&self.session.state(), path)
	}
}

impl std::fmt::Debug for App {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("App")
			.field("settings", &self.settings)
			.field("session", &self.session)
			.field("backends", &self.backends)
			.finish()
	}
}
