//! Snapshot listeners
//!
//! A [`ListenerSet`] keeps the listeners registered against one backend. Each
//! registration hands back a [`Subscription`]; dropping it (or calling
//! [`Subscription::unsubscribe`]) removes the listener, so a torn-down view can
//! never be called again.

use crate::backend::IssueScope;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use voice_core::{Error, Issue};

/// What a listener receives: the full current result set, or the failure that
/// prevented reading it.
pub type SnapshotResult<'a> = std::result::Result<&'a [Issue], &'a Error>;

/// Listener callback.
pub type SnapshotListener = Arc<dyn Fn(SnapshotResult<'_>) + Send + Sync>;

/// Wraps a closure as a [`SnapshotListener`].
pub fn listener<F>(callback: F) -> SnapshotListener
where
	F: Fn(SnapshotResult<'_>) + Send + Sync + 'static,
{
	Arc::new(callback)
}

struct Registration {
	id: u64,
	scope: IssueScope,
	listener: SnapshotListener,
}

type Registry = RwLock<Vec<Registration>>;

/// Listeners registered against one backend.
#[derive(Clone, Default)]
pub struct ListenerSet {
	registry: Arc<Registry>,
	next_id: Arc<AtomicU64>,
}

impl ListenerSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `listener` for results matching `scope`.
	pub fn register(&self, scope: IssueScope, listener: SnapshotListener) -> Subscription {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.registry.write().push(Registration {
			id,
			scope,
			listener,
		});

		Subscription {
			id,
			registry: Arc::downgrade(&self.registry),
		}
	}

	/// Delivers `issues` (already ordered) to every listener, each filtered by
	/// its own scope.
	pub fn notify(&self, issues: &[Issue]) {
		for (scope, listener) in self.snapshot_listeners() {
			match scope {
				IssueScope::All => listener(Ok(issues)),
				scoped => {
					let matching: Vec<Issue> = issues
						.iter()
						.filter(|issue| scoped.matches(issue))
						.cloned()
						.collect();
					listener(Ok(matching.as_slice()));
				}
			}
		}
	}

	/// Delivers a read failure to every listener.
	pub fn fail(&self, error: &Error) {
		for (_, listener) in self.snapshot_listeners() {
			listener(Err(error));
		}
	}

	/// Number of live registrations.
	pub fn len(&self) -> usize {
		self.registry.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.registry.read().is_empty()
	}

	// Listeners are cloned out so a callback may drop its own subscription
	// without deadlocking on the registry lock.
	fn snapshot_listeners(&self) -> Vec<(IssueScope, SnapshotListener)> {
		self.registry
			.read()
			.iter()
			.map(|registration| (registration.scope.clone(), registration.listener.clone()))
			.collect()
	}
}

/// Handle for a registered listener. Unregisters on drop.
#[must_use = "dropping a Subscription unregisters its listener immediately"]
pub struct Subscription {
	id: u64,
	registry: Weak<Registry>,
}

impl Subscription {
	/// A subscription bound to nothing, for listeners that were never registered.
	pub fn detached() -> Self {
		Self {
			id: u64::MAX,
			registry: Weak::new(),
		}
	}

	/// Whether the listener is still registered.
	pub fn is_active(&self) -> bool {
		self.registry
			.upgrade()
			.is_some_and(|registry| registry.read().iter().any(|r| r.id == self.id))
	}

	/// Unregisters the listener now.
	pub fn unsubscribe(self) {
		drop(self);
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(registry) = self.registry.upgrade() {
			registry.write().retain(|registration| registration.id != self.id);
		}
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("id", &self.id)
			.field("active", &self.is_active())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use parking_lot::Mutex;
	use uuid::Uuid;
	use voice_core::{Category, NewIssue, Role, User};

	fn issue_by(uid: &str) -> Issue {
		let author = User::new(uid, "a@b.c", uid, Role::Student, None).unwrap();
		Issue::new(
			Uuid::new_v4(),
			NewIssue::new("t", "d", Category::Other),
			&author,
			Utc::now(),
		)
	}

	fn recorder() -> (SnapshotListener, Arc<Mutex<Vec<usize>>>) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();
		let recorder = listener(move |result| {
			if let Ok(issues) = result {
				sink.lock().push(issues.len());
			}
		});
		(recorder, seen)
	}

	#[test]
	fn test_drop_unregisters() {
		let set = ListenerSet::new();
		let (listener, seen) = recorder();

		let subscription = set.register(IssueScope::All, listener);
		set.notify(&[issue_by("a")]);
		assert!(subscription.is_active());

		drop(subscription);
		set.notify(&[issue_by("a")]);

		assert_eq!(*seen.lock(), vec![1]);
		assert!(set.is_empty());
	}

	#[test]
	fn test_scope_filters_each_listener() {
		let set = ListenerSet::new();
		let (all, seen_all) = recorder();
		let (mine, seen_mine) = recorder();
		let _a = set.register(IssueScope::All, all);
		let _b = set.register(IssueScope::AuthoredBy("alice".into()), mine);

		set.notify(&[issue_by("alice"), issue_by("bob"), issue_by("alice")]);

		assert_eq!(*seen_all.lock(), vec![3]);
		assert_eq!(*seen_mine.lock(), vec![2]);
	}

	#[test]
	fn test_listener_may_drop_its_own_subscription() {
		let set = ListenerSet::new();
		let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
		let inner = slot.clone();
		let dropper = listener(move |_| {
			inner.lock().take();
		});

		*slot.lock() = Some(set.register(IssueScope::All, dropper));
		set.notify(&[]);

		assert!(set.is_empty());
	}

	#[test]
	fn test_detached_is_inactive() {
		assert!(!Subscription::detached().is_active());
	}
}
