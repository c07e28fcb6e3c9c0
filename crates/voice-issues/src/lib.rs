//! # Voice Issues
//!
//! The issue repository and everything derived from its live snapshots.
//!
//! ## Architecture
//!
//! - [`repository`]: [`IssueRepository`], the single entry point for issue
//!   mutations, bound to one storage backend and one [`IssuePolicy`](voice_auth::IssuePolicy)
//! - [`projection`]: pure filters, sorts and aggregates over issue lists
//! - [`feed`]: [`IssueFeed`] and [`UserIssues`], views that hold the latest
//!   snapshot and release their subscription on drop

pub mod feed;
pub mod projection;
pub mod repository;

pub use feed::{FeedState, IssueFeed, UserIssues};
pub use projection::{
	CategoryFilter, IssueQuery, IssueStats, Selection, SortOrder, StatusFilter, UserActivity,
	aggregate_stats, filter_by_category, filter_by_status, issues_authored_by, issues_voted_by,
	sort_by_votes, sort_recent, user_activity,
};
pub use repository::{IssueRepository, VoteOutcome};
