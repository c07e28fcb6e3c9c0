//! Issue projections
//!
//! Pure functions over issue lists. None of them touch storage; views call
//! them on each snapshot they receive.
//!
//! Filters keep the input order. Both sorts are stable, so filtering and then
//! sorting a snapshot gives the same order as sorting and then filtering it.

use serde::Serialize;
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use voice_core::{Category, Error, Issue, IssueStatus, Result};

/// Either every value or exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selection<T> {
	All,
	Only(T),
}

impl<T> Default for Selection<T> {
	fn default() -> Self {
		Selection::All
	}
}

impl<T: PartialEq> Selection<T> {
	/// Whether `value` passes this selection.
	pub fn accepts(&self, value: &T) -> bool {
		match self {
			Selection::All => true,
			Selection::Only(wanted) => wanted == value,
		}
	}
}

impl<T> FromStr for Selection<T>
where
	T: FromStr<Err = Error>,
{
	type Err = Error;

	/// `"all"` (any case) selects everything; anything else must parse as `T`.
	fn from_str(s: &str) -> Result<Self> {
		if s.trim().eq_ignore_ascii_case("all") {
			Ok(Selection::All)
		} else {
			s.parse().map(Selection::Only)
		}
	}
}

impl<T: fmt::Display> fmt::Display for Selection<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Selection::All => f.write_str("all"),
			Selection::Only(value) => value.fmt(f),
		}
	}
}

pub type CategoryFilter = Selection<Category>;
pub type StatusFilter = Selection<IssueStatus>;

/// Keeps issues in the selected category.
pub fn filter_by_category(mut issues: Vec<Issue>, filter: CategoryFilter) -> Vec<Issue> {
	issues.retain(|issue| filter.accepts(&issue.category));
	issues
}

/// Keeps issues with the selected status.
pub fn filter_by_status(mut issues: Vec<Issue>, filter: StatusFilter) -> Vec<Issue> {
	issues.retain(|issue| filter.accepts(&issue.status));
	issues
}

/// Newest first.
pub fn sort_recent(mut issues: Vec<Issue>) -> Vec<Issue> {
	issues.sort_by_key(|issue| Reverse(issue.created_at));
	issues
}

/// Most votes first; ties keep their input order.
pub fn sort_by_votes(mut issues: Vec<Issue>) -> Vec<Issue> {
	issues.sort_by_key(|issue| Reverse(issue.vote_count()));
	issues
}

pub fn issues_authored_by(mut issues: Vec<Issue>, uid: &str) -> Vec<Issue> {
	issues.retain(|issue| issue.is_authored_by(uid));
	issues
}

pub fn issues_voted_by(mut issues: Vec<Issue>, uid: &str) -> Vec<Issue> {
	issues.retain(|issue| issue.has_voted(uid));
	issues
}

/// Collection totals shown on the dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueStats {
	pub total: usize,
	pub pending: usize,
	pub solved: usize,
	pub total_votes: usize,
}

/// Totals over `issues`.
///
/// # Examples
///
/// ```
/// use voice_issues::aggregate_stats;
///
/// let stats = aggregate_stats(&[]);
/// assert_eq!(stats.total, 0);
/// assert_eq!(stats.total_votes, 0);
/// ```
pub fn aggregate_stats(issues: &[Issue]) -> IssueStats {
	issues.iter().fold(IssueStats::default(), |mut stats, issue| {
		stats.total += 1;
		match issue.status {
			IssueStatus::Pending => stats.pending += 1,
			IssueStatus::Solved => stats.solved += 1,
		}
		stats.total_votes += issue.vote_count();
		stats
	})
}

/// One user's footprint, as shown on their settings page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivity {
	/// Issues the user created
	pub issues_posted: usize,
	/// Votes received across those issues
	pub votes_received: usize,
	/// Issues the user currently votes for
	pub voted_on: usize,
}

pub fn user_activity(issues: &[Issue], uid: &str) -> UserActivity {
	let mut activity = UserActivity::default();
	for issue in issues {
		if issue.is_authored_by(uid) {
			activity.issues_posted += 1;
			activity.votes_received += issue.vote_count();
		}
		if issue.has_voted(uid) {
			activity.voted_on += 1;
		}
	}
	activity
}

/// Sort order offered by the issue lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
	#[default]
	Recent,
	Votes,
}

impl FromStr for SortOrder {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"recent" => Ok(SortOrder::Recent),
			"votes" => Ok(SortOrder::Votes),
			other => Err(Error::validation(format!("unknown sort order: {other}"))),
		}
	}
}

impl fmt::Display for SortOrder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			SortOrder::Recent => "recent",
			SortOrder::Votes => "votes",
		})
	}
}

/// Filter-then-sort pipeline behind the dashboard controls.
///
/// # Examples
///
/// ```
/// use voice_issues::{IssueQuery, SortOrder};
///
/// let query = IssueQuery::new()
///     .category("facility".parse().unwrap())
///     .status("all".parse().unwrap())
///     .sort(SortOrder::Votes);
///
/// assert!(query.apply(Vec::new()).is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IssueQuery {
	pub category: CategoryFilter,
	pub status: StatusFilter,
	pub sort: SortOrder,
}

impl IssueQuery {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn category(mut self, category: CategoryFilter) -> Self {
		self.category = category;
		self
	}

	pub fn status(mut self, status: StatusFilter) -> Self {
		self.status = status;
		self
	}

	pub fn sort(mut self, sort: SortOrder) -> Self {
		self.sort = sort;
		self
	}

	pub fn apply(&self, issues: Vec<Issue>) -> Vec<Issue> {
		let issues = filter_by_status(filter_by_category(issues, self.category), self.status);
		match self.sort {
			SortOrder::Recent => sort_recent(issues),
			SortOrder::Votes => sort_by_votes(issues),
		}
	}
}
