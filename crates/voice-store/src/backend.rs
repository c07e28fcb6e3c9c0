//! Storage backend capability
//!
//! The repository never talks to a concrete store. It is written against
//! [`StorageBackend`] and receives whichever implementation the session picked
//! through [`StorageBackends::select`].

use crate::subscription::{SnapshotListener, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use voice_core::{BackendKind, Issue, IssueId, IssuePatch, Result};

/// Which issues a list or subscription covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IssueScope {
	/// Every issue in the collection
	#[default]
	All,
	/// Issues whose `author_id` equals the given uid
	AuthoredBy(String),
}

impl IssueScope {
	/// Whether `issue` falls inside this scope.
	pub fn matches(&self, issue: &Issue) -> bool {
		match self {
			IssueScope::All => true,
			IssueScope::AuthoredBy(uid) => issue.is_authored_by(uid),
		}
	}
}

/// Orders issues newest first.
///
/// Issues created in the same instant fall back to id order so that every
/// backend hands out the same sequence.
pub fn newest_first(issues: &mut [Issue]) {
	issues.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Persistence and change notification for the issue collection.
///
/// Implementations differ in what happens when a referenced issue is missing:
/// the durable backend reports [`voice_core::Error::NotFound`], the local backend
/// treats the mutation as a no-op.
#[async_trait]
pub trait StorageBackend: Send + Sync {
	/// Which backend this is.
	fn kind(&self) -> BackendKind;

	/// Current issues in `scope`, newest first.
	async fn list(&self, scope: &IssueScope) -> Result<Vec<Issue>>;

	/// Looks up one issue.
	async fn get(&self, id: IssueId) -> Result<Option<Issue>>;

	/// Stores a newly created issue.
	async fn insert(&self, issue: Issue) -> Result<()>;

	/// Applies a field-level update.
	async fn patch(&self, id: IssueId, patch: IssuePatch) -> Result<()>;

	/// Removes an issue.
	async fn delete(&self, id: IssueId) -> Result<()>;

	/// Adds `uid` to the issue's vote set. Adding an existing voter is a no-op
	/// apart from the timestamp.
	async fn add_vote(&self, id: IssueId, uid: &str, at: DateTime<Utc>) -> Result<()>;

	/// Removes `uid` from the issue's vote set.
	async fn remove_vote(&self, id: IssueId, uid: &str, at: DateTime<Utc>) -> Result<()>;

	/// Registers `listener` for snapshots of `scope`.
	///
	/// The listener is called once with the current snapshot before this
	/// returns, then again after every change, until the returned
	/// [`Subscription`] is dropped.
	async fn watch(&self, scope: IssueScope, listener: SnapshotListener) -> Subscription;
}

/// The two backends a session can be bound to.
#[derive(Clone)]
pub struct StorageBackends {
	durable: Arc<dyn StorageBackend>,
	local: Arc<dyn StorageBackend>,
}

impl StorageBackends {
	pub fn new(durable: Arc<dyn StorageBackend>, local: Arc<dyn StorageBackend>) -> Self {
		Self { durable, local }
	}

	/// Backend for a session bound to `kind`.
	pub fn select(&self, kind: BackendKind) -> Arc<dyn StorageBackend> {
		match kind {
			BackendKind::Durable => self.durable.clone(),
			BackendKind::Local => self.local.clone(),
		}
	}
}

impl std::fmt::Debug for StorageBackends {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StorageBackends")
			.field("durable", &self.durable.kind())
			.field("local", &self.local.kind())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use uuid::Uuid;
	use voice_core::{Category, NewIssue, Role, User};

	fn issue_at(uid: &str, offset_secs: i64) -> Issue {
		let author = User::new(uid, "a@b.c", uid, Role::Student, None).unwrap();
		let base = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
			.unwrap()
			.with_timezone(&Utc);
		Issue::new(
			Uuid::new_v4(),
			NewIssue::new("t", "d", Category::Other),
			&author,
			base + Duration::seconds(offset_secs),
		)
	}

	#[test]
	fn test_newest_first() {
		let mut issues = vec![issue_at("a", 0), issue_at("b", 20), issue_at("c", 10)];

		newest_first(&mut issues);

		let authors: Vec<_> = issues.iter().map(|i| i.author_id.as_str()).collect();
		assert_eq!(authors, vec!["b", "c", "a"]);
	}

	#[test]
	fn test_scope_matches_author() {
		let issue = issue_at("alice", 0);

		assert!(IssueScope::All.matches(&issue));
		assert!(IssueScope::AuthoredBy("alice".into()).matches(&issue));
		assert!(!IssueScope::AuthoredBy("bob".into()).matches(&issue));
	}
}
