//! Local backend
//!
//! Keeps the whole issue collection, serialized as one JSON array, in a single
//! [`LocalCache`] slot. Every mutation is read-modify-write of the entire slot
//! under one async mutex, followed by a snapshot to this backend's listeners.
//!
//! Mutations that reference an unknown id are silent no-ops: the slot is not
//! rewritten and no snapshot is published.

use crate::backend::{IssueScope, StorageBackend, newest_first};
use crate::cache::LocalCache;
use crate::subscription::{ListenerSet, SnapshotListener, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use voice_core::{BackendKind, Issue, IssueId, IssuePatch, Result};

/// Slot used when none is configured.
pub const DEFAULT_SLOT: &str = "demo_issues";

/// [`StorageBackend`] persisted in a device-local cache slot.
pub struct LocalBackend<C> {
	cache: C,
	slot: String,
	lock: Mutex<()>,
	listeners: ListenerSet,
}

impl<C: LocalCache> LocalBackend<C> {
	/// Creates a backend over [`DEFAULT_SLOT`].
	pub fn new(cache: C) -> Self {
		Self::with_slot(cache, DEFAULT_SLOT)
	}

	/// Creates a backend over a named slot.
	pub fn with_slot(cache: C, slot: impl Into<String>) -> Self {
		Self {
			cache,
			slot: slot.into(),
			lock: Mutex::new(()),
			listeners: ListenerSet::new(),
		}
	}

	/// Name of the slot holding the collection.
	pub fn slot(&self) -> &str {
		&self.slot
	}

	/// The underlying cache.
	pub fn cache(&self) -> &C {
		&self.cache
	}

	async fn load(&self) -> Result<Vec<Issue>> {
		match self.cache.read(&self.slot).await? {
			Some(contents) if !contents.trim().is_empty() => Ok(serde_json::from_str(&contents)?),
			_ => Ok(Vec::new()),
		}
	}

	async fn save(&self, issues: &[Issue]) -> Result<()> {
		let contents = serde_json::to_string(issues)?;
		self.cache.write(&self.slot, &contents).await
	}

	/// Applies `change` to the stored collection. `change` reports whether it
	/// modified anything; unchanged collections are neither saved nor published.
	async fn mutate<F>(&self, change: F) -> Result<bool>
	where
		F: FnOnce(&mut Vec<Issue>) -> bool + Send,
	{
		let _guard = self.lock.lock().await;
		let mut issues = self.load().await?;
		if !change(&mut issues) {
			return Ok(false);
		}
		self.save(&issues).await?;

		newest_first(&mut issues);
		self.listeners.notify(&issues);
		Ok(true)
	}

	async fn modify_issue<F>(&self, id: IssueId, change: F) -> Result<()>
	where
		F: FnOnce(&mut Issue) + Send,
	{
		let applied = self
			.mutate(|issues| match issues.iter_mut().find(|issue| issue.id == id) {
				Some(issue) => {
					change(issue);
					true
				}
				None => false,
			})
			.await?;
		if !applied {
			tracing::debug!(issue_id = %id, slot = %self.slot, "Ignoring change to unknown local issue");
		}
		Ok(())
	}
}

impl<C> std::fmt::Debug for LocalBackend<C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LocalBackend")
			.field("slot", &self.slot)
			.field("listeners", &self.listeners.len())
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl<C: LocalCache> StorageBackend for LocalBackend<C> {
	fn kind(&self) -> BackendKind {
		BackendKind::Local
	}

	async fn list(&self, scope: &IssueScope) -> Result<Vec<Issue>> {
		let _guard = self.lock.lock().await;
		let mut issues = self.load().await?;
		issues.retain(|issue| scope.matches(issue));
		newest_first(&mut issues);
		Ok(issues)
	}

	async fn get(&self, id: IssueId) -> Result<Option<Issue>> {
		let _guard = self.lock.lock().await;
		Ok(self.load().await?.into_iter().find(|issue| issue.id == id))
	}

	async fn insert(&self, issue: Issue) -> Result<()> {
		self.mutate(|issues| {
			issues.insert(0, issue);
			true
		})
		.await?;
		Ok(())
	}

	async fn patch(&self, id: IssueId, patch: IssuePatch) -> Result<()> {
		self.modify_issue(id, |issue| issue.apply(&patch)).await
	}

	async fn delete(&self, id: IssueId) -> Result<()> {
		self.mutate(|issues| {
			let before = issues.len();
			issues.retain(|issue| issue.id != id);
			issues.len() != before
		})
		.await?;
		Ok(())
	}

	async fn add_vote(&self, id: IssueId, uid: &str, at: DateTime<Utc>) -> Result<()> {
		self.modify_issue(id, |issue| {
			issue.votes.insert(uid.to_string());
			issue.updated_at = at;
		})
		.await
	}

	async fn remove_vote(&self, id: IssueId, uid: &str, at: DateTime<Utc>) -> Result<()> {
		self.modify_issue(id, |issue| {
			issue.votes.remove(uid);
			issue.updated_at = at;
		})
		.await
	}

	async fn watch(&self, scope: IssueScope, listener: SnapshotListener) -> Subscription {
		match self.list(&scope).await {
			Ok(issues) => listener(Ok(issues.as_slice())),
			Err(e) => listener(Err(&e)),
		}
		self.listeners.register(scope, listener)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::MemoryCache;
	use crate::subscription::listener;
	use parking_lot::Mutex as SyncMutex;
	use rstest::{fixture, rstest};
	use std::sync::Arc;
	use uuid::Uuid;
	use voice_core::{Category, Error, NewIssue, Role, User};

	#[fixture]
	fn backend() -> LocalBackend<MemoryCache> {
		LocalBackend::new(MemoryCache::new())
	}

	fn issue(title: &str) -> Issue {
		let author = User::new("demo-user-1", "demo@local", "Demo", Role::Student, None).unwrap();
		Issue::new(
			Uuid::new_v4(),
			NewIssue::new(title, "d", Category::Other),
			&author,
			Utc::now(),
		)
	}

	#[rstest]
	#[tokio::test]
	async fn test_empty_slot_is_empty_collection(backend: LocalBackend<MemoryCache>) {
		backend.cache().write(DEFAULT_SLOT, "  ").await.unwrap();

		assert!(backend.list(&IssueScope::All).await.unwrap().is_empty());
	}

	#[rstest]
	#[tokio::test]
	async fn test_corrupt_slot_is_serialization_error(backend: LocalBackend<MemoryCache>) {
		backend.cache().write(DEFAULT_SLOT, "{not json").await.unwrap();

		let result = backend.list(&IssueScope::All).await;

		assert!(matches!(result, Err(Error::Serialization(_))));
	}

	#[rstest]
	#[tokio::test]
	async fn test_insert_prepends(backend: LocalBackend<MemoryCache>) {
		let first = issue("first");
		let second = issue("second");
		backend.insert(first.clone()).await.unwrap();
		backend.insert(second.clone()).await.unwrap();

		let raw = backend.cache().read(DEFAULT_SLOT).await.unwrap().unwrap();
		let stored: Vec<Issue> = serde_json::from_str(&raw).unwrap();

		assert_eq!(stored[0].id, second.id);
		assert_eq!(stored[1].id, first.id);
	}

	#[rstest]
	#[case::patch(0)]
	#[case::add_vote(1)]
	#[case::remove_vote(2)]
	#[case::delete(3)]
	#[tokio::test]
	async fn test_missing_id_is_noop(backend: LocalBackend<MemoryCache>, #[case] operation: u8) {
		let kept = issue("kept");
		backend.insert(kept.clone()).await.unwrap();
		let before = backend.cache().read(DEFAULT_SLOT).await.unwrap();
		let missing = Uuid::new_v4();

		match operation {
			0 => backend.patch(missing, IssuePatch::touch(Utc::now())).await,
			1 => backend.add_vote(missing, "u1", Utc::now()).await,
			2 => backend.remove_vote(missing, "u1", Utc::now()).await,
			_ => backend.delete(missing).await,
		}
		.unwrap();

		assert_eq!(backend.cache().read(DEFAULT_SLOT).await.unwrap(), before);
	}

	#[rstest]
	#[tokio::test]
	async fn test_watch_sees_initial_and_updates(backend: LocalBackend<MemoryCache>) {
		let seen = Arc::new(SyncMutex::new(Vec::new()));
		let sink = seen.clone();
		let subscription = backend
			.watch(
				IssueScope::All,
				listener(move |result| {
					if let Ok(issues) = result {
						sink.lock().push(issues.len());
					}
				}),
			)
			.await;

		let created = issue("a");
		backend.insert(created.clone()).await.unwrap();
		backend.add_vote(created.id, "u1", Utc::now()).await.unwrap();
		subscription.unsubscribe();
		backend.delete(created.id).await.unwrap();

		assert_eq!(*seen.lock(), vec![0, 1, 1]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_named_slots_are_independent() {
		let cache = Arc::new(MemoryCache::new());
		let a = LocalBackend::with_slot(cache.clone(), "a");
		let b = LocalBackend::with_slot(cache, "b");

		a.insert(issue("only in a")).await.unwrap();

		assert_eq!(a.list(&IssueScope::All).await.unwrap().len(), 1);
		assert!(b.list(&IssueScope::All).await.unwrap().is_empty());
	}
}
