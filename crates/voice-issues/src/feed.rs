//! Live feeds
//!
//! A feed subscribes through the repository and keeps the latest snapshot.
//! Each delivery replaces the previous one wholesale. A failed delivery is
//! logged and leaves the previous snapshot in place, marked with the error.
//!
//! Dropping a feed drops its [`Subscription`], so a closed view is never called
//! again.

use crate::projection::{UserActivity, issues_authored_by, issues_voted_by, user_activity};
use crate::repository::IssueRepository;
use parking_lot::RwLock;
use std::sync::Arc;
use voice_core::Issue;
use voice_store::{IssueScope, Subscription, listener};

/// What a feed currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
	/// Latest delivered issues, in backend order
	pub issues: Vec<Issue>,
	/// No snapshot has arrived yet
	pub loading: bool,
	/// Set when the last delivery failed; `issues` is then stale
	pub error: Option<String>,
	/// Number of deliveries so far, failures included
	pub revision: u64,
}

impl Default for FeedState {
	fn default() -> Self {
		Self {
			issues: Vec::new(),
			loading: true,
			error: None,
			revision: 0,
		}
	}
}

impl FeedState {
	pub fn is_stale(&self) -> bool {
		self.error.is_some()
	}
}

/// Latest snapshot of one scope.
pub struct IssueFeed {
	scope: IssueScope,
	state: Arc<RwLock<FeedState>>,
	subscription: Subscription,
}

impl IssueFeed {
	/// Follows the whole collection.
	pub async fn open(repository: &IssueRepository) -> Self {
		Self::open_scoped(repository, IssueScope::All).await
	}

	/// Follows the issues in `scope`.
	pub async fn open_scoped(repository: &IssueRepository, scope: IssueScope) -> Self {
		let state = Arc::new(RwLock::new(FeedState::default()));
		let sink = Arc::clone(&state);
		let label = format!("{scope:?}");

		let subscription = repository
			.subscribe_scoped(
				scope.clone(),
				listener(move |result| {
					let mut state = sink.write();
					state.revision += 1;
					state.loading = false;
					match result {
						Ok(issues) => {
							state.issues = issues.to_vec();
							state.error = None;
						}
						Err(e) => {
							tracing::error!(error = %e, scope = %label, "Issue feed delivery failed");
							state.error = Some(e.to_string());
						}
					}
				}),
			)
			.await;

		Self {
			scope,
			state,
			subscription,
		}
	}

	pub fn scope(&self) -> &IssueScope {
		&self.scope
	}

	/// Copy of the current state.
	pub fn state(&self) -> FeedState {
		self.state.read().clone()
	}

	/// Current issues.
	pub fn issues(&self) -> Vec<Issue> {
		self.state.read().issues.clone()
	}

	pub fn is_loading(&self) -> bool {
		self.state.read().loading
	}

	/// Whether the feed is still receiving deliveries.
	pub fn is_active(&self) -> bool {
		self.subscription.is_active()
	}

	/// Stops the feed now instead of at drop.
	pub fn close(self) {
		self.subscription.unsubscribe();
	}
}

impl std::fmt::Debug for IssueFeed {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.read();
		f.debug_struct("IssueFeed")
			.field("scope", &self.scope)
			.field("issues", &state.issues.len())
			.field("loading", &state.loading)
			.field("revision", &state.revision)
			.finish()
	}
}

/// One user's issues: those they wrote and those they vote for.
#[derive(Debug)]
pub struct UserIssues {
	uid: String,
	authored: IssueFeed,
	everything: IssueFeed,
}

impl UserIssues {
	pub async fn open(repository: &IssueRepository, uid: impl Into<String>) -> Self {
		let uid = uid.into();
		let authored = IssueFeed::open_scoped(repository, IssueScope::AuthoredBy(uid.clone())).await;
		let everything = IssueFeed::open(repository).await;
		Self {
			uid,
			authored,
			everything,
		}
	}

	pub fn uid(&self) -> &str {
		&self.uid
	}

	/// Issues the user created, newest first.
	pub fn authored(&self) -> Vec<Issue> {
		issues_authored_by(self.authored.issues(), &self.uid)
	}

	/// Issues the user currently votes for.
	pub fn voted(&self) -> Vec<Issue> {
		issues_voted_by(self.everything.issues(), &self.uid)
	}

	pub fn activity(&self) -> UserActivity {
		user_activity(&self.everything.issues(), &self.uid)
	}

	pub fn is_loading(&self) -> bool {
		self.authored.is_loading() || self.everything.is_loading()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use voice_core::{Category, NewIssue, Role, User};
	use voice_store::{MemoryIssueStore, RemoteBackend};

	fn repository() -> (IssueRepository, MemoryIssueStore) {
		let store = MemoryIssueStore::new();
		let repository = IssueRepository::new(Arc::new(RemoteBackend::new(store.clone())));
		(repository, store)
	}

	fn student(uid: &str) -> User {
		User::new(uid, format!("{uid}@campus.edu"), uid, Role::Student, None).unwrap()
	}

	#[tokio::test]
	async fn test_feed_replaces_snapshot() {
		let (repository, _) = repository();
		let feed = IssueFeed::open(&repository).await;
		assert!(!feed.is_loading());
		assert_eq!(feed.state().revision, 1);

		let alice = student("alice");
		repository
			.create_issue(NewIssue::new("one", "d", Category::Other), Some(&alice))
			.await
			.unwrap();
		repository
			.create_issue(NewIssue::new("two", "d", Category::Other), Some(&alice))
			.await
			.unwrap();

		let titles: Vec<_> = feed.issues().into_iter().map(|i| i.title).collect();
		assert_eq!(titles.len(), 2);
		assert_eq!(feed.state().revision, 3);
	}

	#[tokio::test]
	async fn test_failure_keeps_stale_snapshot() {
		let (repository, store) = repository();
		let alice = student("alice");
		repository
			.create_issue(NewIssue::new("kept", "d", Category::Other), Some(&alice))
			.await
			.unwrap();
		let feed = IssueFeed::open(&repository).await;

		store.set_available(false);

		let state = feed.state();
		assert!(state.is_stale());
		assert_eq!(state.issues.len(), 1);
	}

	#[tokio::test]
	async fn test_drop_releases_subscription() {
		let (repository, store) = repository();
		let feed = IssueFeed::open(&repository).await;
		assert_eq!(store.listener_count(), 1);

		drop(feed);

		assert_eq!(store.listener_count(), 0);
	}

	#[tokio::test]
	async fn test_user_issues_views() {
		let (repository, _) = repository();
		let alice = student("alice");
		let bob = student("bob");
		let mine = repository
			.create_issue(NewIssue::new("mine", "d", Category::Other), Some(&alice))
			.await
			.unwrap();
		let theirs = repository
			.create_issue(NewIssue::new("theirs", "d", Category::Other), Some(&bob))
			.await
			.unwrap();

		let view = UserIssues::open(&repository, "alice").await;
		repository.toggle_vote(theirs, Some(&alice)).await.unwrap();
		repository.toggle_vote(mine, Some(&bob)).await.unwrap();

		assert_eq!(view.authored().iter().map(|i| i.id).collect::<Vec<_>>(), vec![mine]);
		assert_eq!(view.voted().iter().map(|i| i.id).collect::<Vec<_>>(), vec![theirs]);
		assert_eq!(
			view.activity(),
			UserActivity {
				issues_posted: 1,
				votes_received: 1,
				voted_on: 1,
			}
		);
	}
}
