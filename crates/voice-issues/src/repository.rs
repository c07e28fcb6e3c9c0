//! Issue repository
//!
//! [`IssueRepository`] validates input, applies the [`IssuePolicy`] and
//! forwards every change to the [`StorageBackend`] chosen for the session.
//! Live views do not read the repository's return values; they observe the
//! backend through [`IssueRepository::subscribe`].

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use voice_auth::{IssueAction, IssuePolicy};
use voice_core::{
	AdminNote, BackendKind, Error, Issue, IssueChanges, IssueId, IssuePatch, IssueStatus, NewIssue,
	Result, User,
};
use voice_store::{IssueScope, SnapshotListener, StorageBackend, Subscription};

/// Result of [`IssueRepository::toggle_vote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
	/// The actor's vote was recorded
	Added,
	/// The actor's vote was withdrawn
	Removed,
	/// The issue no longer exists in the local backend; nothing changed
	Missing,
}

/// Issue operations over one storage backend.
#[derive(Clone)]
pub struct IssueRepository {
	backend: Arc<dyn StorageBackend>,
	policy: IssuePolicy,
}

impl IssueRepository {
	/// Creates a repository enforcing [`IssuePolicy::Strict`].
	pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
		Self {
			backend,
			policy: IssuePolicy::default(),
		}
	}

	pub fn with_policy(mut self, policy: IssuePolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn policy(&self) -> IssuePolicy {
		self.policy
	}

	pub fn backend_kind(&self) -> BackendKind {
		self.backend.kind()
	}

	/// Creates a pending issue authored by `actor` and returns its id.
	///
	/// # Errors
	///
	/// - [`Error::NotAuthenticated`] without an actor
	/// - [`Error::Validation`] for an empty or over-long title or description
	/// - [`Error::Forbidden`] when the policy rejects the actor's role
	pub async fn create_issue(&self, input: NewIssue, actor: Option<&User>) -> Result<IssueId> {
		self.policy.authorize(IssueAction::Create, actor, None)?;
		let author = actor.ok_or(Error::NotAuthenticated)?;
		let input = input.validated()?;

		let issue = Issue::new(Uuid::new_v4(), input, author, Utc::now());
		let id = issue.id;
		self.backend.insert(issue).await?;

		tracing::info!(issue_id = %id, author = %author.uid, "Issue created");
		Ok(id)
	}

	/// Merges author-editable fields and bumps `updated_at`.
	pub async fn update_issue(&self, id: IssueId, changes: IssueChanges, actor: Option<&User>) -> Result<()> {
		let changes = changes.validated()?;
		self.authorize_on(IssueAction::Edit, id, actor).await?;

		self.backend
			.patch(id, IssuePatch::from_changes(changes, Utc::now()))
			.await?;
		tracing::debug!(issue_id = %id, "Issue updated");
		Ok(())
	}

	/// Removes an issue permanently. Deleting a missing issue succeeds.
	pub async fn delete_issue(&self, id: IssueId, actor: Option<&User>) -> Result<()> {
		self.authorize_on(IssueAction::Delete, id, actor).await?;

		self.backend.delete(id).await?;
		tracing::info!(issue_id = %id, "Issue deleted");
		Ok(())
	}

	/// Adds the actor's vote, or withdraws it if already present.
	///
	/// Exactly one membership change happens per call. On the durable backend a
	/// missing issue is [`Error::NotFound`]; on the local backend it is
	/// [`VoteOutcome::Missing`].
	pub async fn toggle_vote(&self, id: IssueId, actor: Option<&User>) -> Result<VoteOutcome> {
		self.policy.authorize(IssueAction::Vote, actor, None)?;
		let voter = actor.ok_or(Error::NotAuthenticated)?;

		let Some(issue) = self.backend.get(id).await? else {
			return match self.backend.kind() {
				BackendKind::Durable => Err(Error::NotFound(id)),
				BackendKind::Local => Ok(VoteOutcome::Missing),
			};
		};

		let now = Utc::now();
		let outcome = if issue.has_voted(&voter.uid) {
			self.backend.remove_vote(id, &voter.uid, now).await?;
			VoteOutcome::Removed
		} else {
			self.backend.add_vote(id, &voter.uid, now).await?;
			VoteOutcome::Added
		};

		tracing::debug!(issue_id = %id, voter = %voter.uid, ?outcome, "Vote toggled");
		Ok(outcome)
	}

	/// Sets the triage status.
	pub async fn update_status(&self, id: IssueId, status: IssueStatus, actor: Option<&User>) -> Result<()> {
		self.authorize_on(IssueAction::ChangeStatus, id, actor).await?;

		self.backend.patch(id, IssuePatch::status(status, Utc::now())).await?;
		tracing::info!(issue_id = %id, %status, "Issue status changed");
		Ok(())
	}

	/// Attaches an official note signed with the actor's display name,
	/// replacing any earlier note. A blank note is a [`Error::Validation`].
	pub async fn add_admin_note(&self, id: IssueId, note: &str, actor: Option<&User>) -> Result<()> {
		self.authorize_on(IssueAction::Annotate, id, actor).await?;
		let staff = actor.ok_or(Error::NotAuthenticated)?;
		let note = note.trim();
		if note.is_empty() {
			return Err(Error::validation("note must not be empty"));
		}

		let note = AdminNote {
			note: note.to_string(),
			updated_by: staff.display_name.clone(),
			updated_at: Utc::now(),
		};
		self.backend.patch(id, IssuePatch::note(note)).await?;
		tracing::info!(issue_id = %id, by = %staff.uid, "Admin note recorded");
		Ok(())
	}

	/// Watches the whole collection. See [`StorageBackend::watch`].
	pub async fn subscribe(&self, on_snapshot: SnapshotListener) -> Subscription {
		self.backend.watch(IssueScope::All, on_snapshot).await
	}

	/// Watches the issues in `scope`.
	pub async fn subscribe_scoped(&self, scope: IssueScope, on_snapshot: SnapshotListener) -> Subscription {
		self.backend.watch(scope, on_snapshot).await
	}

	/// Current collection, newest first.
	pub async fn issues(&self) -> Result<Vec<Issue>> {
		self.backend.list(&IssueScope::All).await
	}

	pub async fn get_issue(&self, id: IssueId) -> Result<Option<Issue>> {
		self.backend.get(id).await
	}

	// Ownership rules need the stored issue; other actions do not.
	async fn authorize_on(&self, action: IssueAction, id: IssueId, actor: Option<&User>) -> Result<()> {
		let needs_target = self.policy == IssuePolicy::Strict
			&& matches!(action, IssueAction::Edit | IssueAction::Delete);
		let target = if needs_target {
			self.backend.get(id).await?
		} else {
			None
		};
		self.policy.authorize(action, actor, target.as_ref())
	}
}

impl std::fmt::Debug for IssueRepository {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IssueRepository")
			.field("backend", &self.backend.kind())
			.field("policy", &self.policy)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use voice_core::{Category, Role};
	use voice_store::{LocalBackend, MemoryCache, MemoryIssueStore, RemoteBackend};

	fn student(uid: &str) -> User {
		User::new(uid, format!("{uid}@campus.edu"), uid, Role::Student, None).unwrap()
	}

	fn admin() -> User {
		User::new("admin-1", "ops@campus.edu", "Ops Team", Role::Admin, Some("EMP-1".into())).unwrap()
	}

	#[fixture]
	fn durable() -> IssueRepository {
		IssueRepository::new(Arc::new(RemoteBackend::new(MemoryIssueStore::new())))
	}

	#[fixture]
	fn local() -> IssueRepository {
		IssueRepository::new(Arc::new(LocalBackend::new(MemoryCache::new())))
	}

	#[rstest]
	#[tokio::test]
	async fn test_create_requires_actor(durable: IssueRepository) {
		let result = durable
			.create_issue(NewIssue::new("t", "d", Category::Other), None)
			.await;

		assert!(matches!(result, Err(Error::NotAuthenticated)));
	}

	#[rstest]
	#[tokio::test]
	async fn test_create_trims_and_snapshots_author(durable: IssueRepository) {
		let alice = student("alice");

		let id = durable
			.create_issue(NewIssue::new("  Broken AC  ", "Room 204", Category::Facility), Some(&alice))
			.await
			.unwrap();

		let issue = durable.get_issue(id).await.unwrap().unwrap();
		assert_eq!(issue.title, "Broken AC");
		assert_eq!(issue.author_email, "alice@campus.edu");
		assert_eq!(issue.status, IssueStatus::Pending);
		assert!(issue.votes.is_empty());
	}

	#[rstest]
	#[tokio::test]
	async fn test_toggle_vote_missing_issue(durable: IssueRepository, local: IssueRepository) {
		let alice = student("alice");
		let id = Uuid::new_v4();

		assert!(matches!(
			durable.toggle_vote(id, Some(&alice)).await,
			Err(Error::NotFound(missing)) if missing == id
		));
		assert_eq!(local.toggle_vote(id, Some(&alice)).await.unwrap(), VoteOutcome::Missing);
	}

	#[rstest]
	#[tokio::test]
	async fn test_update_missing_issue(durable: IssueRepository, local: IssueRepository) {
		let alice = student("alice");
		let changes = IssueChanges::new().title("New");

		assert!(matches!(
			durable.update_issue(Uuid::new_v4(), changes.clone(), Some(&alice)).await,
			Err(Error::NotFound(_))
		));
		local
			.update_issue(Uuid::new_v4(), changes, Some(&alice))
			.await
			.unwrap();
	}

	#[rstest]
	#[tokio::test]
	async fn test_strict_rejects_foreign_edit(durable: IssueRepository) {
		let alice = student("alice");
		let id = durable
			.create_issue(NewIssue::new("t", "d", Category::Other), Some(&alice))
			.await
			.unwrap();

		let result = durable
			.update_issue(id, IssueChanges::new().title("hijacked"), Some(&student("bob")))
			.await;

		assert!(matches!(result, Err(Error::Forbidden(_))));
		assert_eq!(durable.get_issue(id).await.unwrap().unwrap().title, "t");
	}

	#[rstest]
	#[tokio::test]
	async fn test_permissive_status_without_actor(durable: IssueRepository) {
		let repo = durable.with_policy(IssuePolicy::Permissive);
		let id = repo
			.create_issue(NewIssue::new("t", "d", Category::Other), Some(&admin()))
			.await
			.unwrap();

		repo.update_status(id, IssueStatus::Solved, None).await.unwrap();

		assert_eq!(repo.get_issue(id).await.unwrap().unwrap().status, IssueStatus::Solved);
	}

	#[rstest]
	#[case::empty("")]
	#[case::whitespace("  \n\t ")]
	#[tokio::test]
	async fn test_blank_note_rejected(durable: IssueRepository, #[case] note: &str) {
		let id = durable
			.create_issue(NewIssue::new("t", "d", Category::Other), Some(&student("alice")))
			.await
			.unwrap();

		let result = durable.add_admin_note(id, note, Some(&admin())).await;

		assert!(matches!(result, Err(Error::Validation(_))));
		let issue = durable.get_issue(id).await.unwrap().unwrap();
		assert!(issue.admin_notes.is_none());
		assert!(issue.admin_updated_by.is_none());
	}

	#[rstest]
	#[tokio::test]
	async fn test_note_signed_by_display_name(local: IssueRepository) {
		let alice = student("alice");
		let id = local
			.create_issue(NewIssue::new("t", "d", Category::Other), Some(&alice))
			.await
			.unwrap();

		local.add_admin_note(id, "  On it ", Some(&admin())).await.unwrap();

		let issue = local.get_issue(id).await.unwrap().unwrap();
		assert_eq!(issue.admin_notes.as_deref(), Some("On it"));
		assert_eq!(issue.admin_updated_by.as_deref(), Some("Ops Team"));
		assert_eq!(issue.admin_updated_at, Some(issue.updated_at));
	}
}
