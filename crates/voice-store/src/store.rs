//! Durable document store
//!
//! [`IssueStore`] is the contract of the shared `issues` collection: document
//! CRUD, atomic set add/remove on the `votes` field, and live listeners that
//! receive the full result set after every committed change.
//!
//! [`MemoryIssueStore`] implements it in process. All instances created with
//! [`Clone`] share the same collection, which lets tests stand two sessions on
//! one store.

use crate::backend::{IssueScope, newest_first};
use crate::subscription::{ListenerSet, SnapshotListener, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use voice_core::{Error, Issue, IssueId, IssuePatch, Result};

/// Durable issue collection.
#[async_trait]
pub trait IssueStore: Send + Sync {
	/// Creates a document.
	async fn add(&self, issue: Issue) -> Result<()>;

	/// Reads one document.
	async fn fetch(&self, id: IssueId) -> Result<Option<Issue>>;

	/// Documents in `scope`, ordered by `created_at` descending.
	async fn query(&self, scope: &IssueScope) -> Result<Vec<Issue>>;

	/// Merges `patch` into an existing document. Fails with
	/// [`Error::NotFound`] when the document is absent.
	async fn update(&self, id: IssueId, patch: IssuePatch) -> Result<()>;

	/// Deletes a document. Deleting an absent document succeeds.
	async fn remove(&self, id: IssueId) -> Result<()>;

	/// Atomically adds `uid` to `votes` and sets `updated_at`.
	async fn array_union_vote(&self, id: IssueId, uid: &str, at: DateTime<Utc>) -> Result<()>;

	/// Atomically removes `uid` from `votes` and sets `updated_at`.
	async fn array_remove_vote(&self, id: IssueId, uid: &str, at: DateTime<Utc>) -> Result<()>;

	/// Live query over `scope`. The listener receives the current snapshot
	/// immediately and again after every committed change.
	async fn listen(&self, scope: IssueScope, listener: SnapshotListener) -> Subscription;
}

/// In-process [`IssueStore`].
#[derive(Clone)]
pub struct MemoryIssueStore {
	documents: Arc<RwLock<HashMap<IssueId, Issue>>>,
	listeners: ListenerSet,
	available: Arc<AtomicBool>,
}

impl Default for MemoryIssueStore {
	fn default() -> Self {
		Self {
			documents: Arc::new(RwLock::new(HashMap::new())),
			listeners: ListenerSet::new(),
			available: Arc::new(AtomicBool::new(true)),
		}
	}
}

impl MemoryIssueStore {
	/// Creates an empty, reachable store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Simulates losing or regaining the connection to the store.
	///
	/// While unavailable every call fails with [`Error::BackendUnavailable`]
	/// and live listeners receive the same failure once.
	pub fn set_available(&self, available: bool) {
		let previous = self.available.swap(available, Ordering::SeqCst);
		if previous && !available {
			tracing::warn!("Issue store went offline");
			self.listeners.fail(&offline());
		}
	}

	/// Number of live listeners.
	pub fn listener_count(&self) -> usize {
		self.listeners.len()
	}

	fn ensure_available(&self) -> Result<()> {
		if self.available.load(Ordering::SeqCst) {
			Ok(())
		} else {
			Err(offline())
		}
	}

	/// Delivers the committed state. Callers hold the documents lock, so
	/// snapshots reach listeners in commit order.
	fn publish(&self, documents: &HashMap<IssueId, Issue>) {
		self.listeners.notify(&ordered(documents, &IssueScope::All));
	}

	async fn modify<F>(&self, id: IssueId, change: F) -> Result<()>
	where
		F: FnOnce(&mut Issue) + Send,
	{
		self.ensure_available()?;
		let mut documents = self.documents.write().await;
		let issue = documents.get_mut(&id).ok_or(Error::NotFound(id))?;
		change(issue);
		self.publish(&documents);
		Ok(())
	}
}

fn ordered(documents: &HashMap<IssueId, Issue>, scope: &IssueScope) -> Vec<Issue> {
	let mut issues: Vec<Issue> = documents
		.values()
		.filter(|issue| scope.matches(issue))
		.cloned()
		.collect();
	newest_first(&mut issues);
	issues
}

fn offline() -> Error {
	Error::unavailable("issue store is unreachable")
}

impl std::fmt::Debug for MemoryIssueStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemoryIssueStore")
			.field("available", &self.available.load(Ordering::SeqCst))
			.field("listeners", &self.listeners.len())
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
	async fn add(&self, issue: Issue) -> Result<()> {
		self.ensure_available()?;
		let mut documents = self.documents.write().await;
		documents.insert(issue.id, issue);
		self.publish(&documents);
		Ok(())
	}

	async fn fetch(&self, id: IssueId) -> Result<Option<Issue>> {
		self.ensure_available()?;
		Ok(self.documents.read().await.get(&id).cloned())
	}

	async fn query(&self, scope: &IssueScope) -> Result<Vec<Issue>> {
		self.ensure_available()?;
		Ok(ordered(&*self.documents.read().await, scope))
	}

	async fn update(&self, id: IssueId, patch: IssuePatch) -> Result<()> {
		self.modify(id, |issue| issue.apply(&patch)).await
	}

	async fn remove(&self, id: IssueId) -> Result<()> {
		self.ensure_available()?;
		let mut documents = self.documents.write().await;
		if documents.remove(&id).is_some() {
			self.publish(&documents);
		}
		Ok(())
	}

	async fn array_union_vote(&self, id: IssueId, uid: &str, at: DateTime<Utc>) -> Result<()> {
		self.modify(id, |issue| {
			issue.votes.insert(uid.to_string());
			issue.updated_at = at;
		})
		.await
	}

	async fn array_remove_vote(&self, id: IssueId, uid: &str, at: DateTime<Utc>) -> Result<()> {
		self.modify(id, |issue| {
			issue.votes.remove(uid);
			issue.updated_at = at;
		})
		.await
	}

	async fn listen(&self, scope: IssueScope, listener: SnapshotListener) -> Subscription {
		// Registered before the lock is released, so no commit falls between
		// the first snapshot and the next delivery.
		let documents = self.documents.read().await;
		match self.ensure_available() {
			Ok(()) => listener(Ok(ordered(&documents, &scope).as_slice())),
			Err(e) => listener(Err(&e)),
		}
		self.listeners.register(scope, listener)
	}
}
