//! Durable backend

use crate::backend::{IssueScope, StorageBackend};
use crate::store::IssueStore;
use crate::subscription::{SnapshotListener, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use voice_core::{BackendKind, Issue, IssueId, IssuePatch, Result};

/// [`StorageBackend`] over a shared [`IssueStore`].
///
/// Votes go through the store's atomic set operations, so concurrent toggles
/// by different users never overwrite each other.
#[derive(Debug, Clone)]
pub struct RemoteBackend<S> {
	store: S,
}

impl<S: IssueStore> RemoteBackend<S> {
	pub fn new(store: S) -> Self {
		Self { store }
	}

	/// The wrapped store.
	pub fn store(&self) -> &S {
		&self.store
	}
}

#[async_trait]
impl<S: IssueStore> StorageBackend for RemoteBackend<S> {
	fn kind(&self) -> BackendKind {
		BackendKind::Durable
	}

	async fn list(&self, scope: &IssueScope) -> Result<Vec<Issue>> {
		self.store.query(scope).await
	}

	async fn get(&self, id: IssueId) -> Result<Option<Issue>> {
		self.store.fetch(id).await
	}

	async fn insert(&self, issue: Issue) -> Result<()> {
		let id = issue.id;
		self.store.add(issue).await?;
		tracing::debug!(issue_id = %id, "Issue stored");
		Ok(())
	}

	async fn patch(&self, id: IssueId, patch: IssuePatch) -> Result<()> {
		self.store.update(id, patch).await
	}

	async fn delete(&self, id: IssueId) -> Result<()> {
		self.store.remove(id).await
	}

	async fn add_vote(&self, id: IssueId, uid: &str, at: DateTime<Utc>) -> Result<()> {
		self.store.array_union_vote(id, uid, at).await
	}

	async fn remove_vote(&self, id: IssueId, uid: &str, at: DateTime<Utc>) -> Result<()> {
		self.store.array_remove_vote(id, uid, at).await
	}

	async fn watch(&self, scope: IssueScope, listener: SnapshotListener) -> Subscription {
		self.store.listen(scope, listener).await
	}
}
