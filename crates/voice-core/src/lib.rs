//! # Voice Core
//!
//! Domain types shared by every Campus Voice crate.
//!
//! ## Architecture
//!
//! - [`error`]: the error taxonomy returned by repository, storage and identity operations
//! - [`user`]: users, roles and the storage backend a principal is bound to
//! - [`issue`]: issues, categories, statuses and the field-level change types
//!   applied to them

pub mod error;
pub mod issue;
pub mod user;

pub use error::{Error, Result};
pub use issue::{
	AdminNote, Category, DESCRIPTION_MAX_CHARS, Issue, IssueChanges, IssueId, IssuePatch,
	IssueStatus, NewIssue, TITLE_MAX_CHARS,
};
pub use user::{BackendKind, Role, User};
