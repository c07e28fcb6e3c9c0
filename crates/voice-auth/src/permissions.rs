//! Issue permissions
//!
//! [`IssuePolicy`] decides, at the repository boundary, whether an actor may
//! perform an [`IssueAction`].
//!
//! Creating issues, voting and annotating always require a signed-in actor.
//! Beyond that:
//!
//! | Action          | Strict                | Permissive        |
//! |-----------------|-----------------------|-------------------|
//! | `Create`        | student               | any signed-in     |
//! | `Edit`/`Delete` | the issue's author    | anyone            |
//! | `ChangeStatus`  | admin or management   | anyone            |
//! | `Annotate`      | admin or management   | any signed-in     |
//! | `Vote`          | any signed-in         | any signed-in     |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use voice_core::{Error, Issue, Result, Role, User};

/// A repository operation subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueAction {
	Create,
	Edit,
	Delete,
	ChangeStatus,
	Annotate,
	Vote,
}

impl IssueAction {
	fn verb(self) -> &'static str {
		match self {
			IssueAction::Create => "create issues",
			IssueAction::Edit => "edit this issue",
			IssueAction::Delete => "delete this issue",
			IssueAction::ChangeStatus => "change issue status",
			IssueAction::Annotate => "annotate issues",
			IssueAction::Vote => "vote",
		}
	}

	fn always_requires_actor(self) -> bool {
		matches!(
			self,
			IssueAction::Create | IssueAction::Annotate | IssueAction::Vote
		)
	}
}

/// Authorization rules applied by the issue repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuePolicy {
	/// Role and ownership checks on every mutation
	#[default]
	Strict,
	/// Only the signed-in checks; the caller restricts everything else
	Permissive,
}

impl IssuePolicy {
	/// Checks whether `actor` may perform `action`.
	///
	/// `issue` is the target for per-issue actions. When it is `None` the
	/// target does not exist and ownership cannot be checked; the backend then
	/// decides between `NotFound` and a no-op.
	///
	/// # Examples
	///
	/// ```
	/// use voice_auth::{IssueAction, IssuePolicy};
	/// use voice_core::{Error, Role, User};
	///
	/// let admin = User::new("a1", "a@campus.edu", "Ada", Role::Admin, Some("EMP-1".into())).unwrap();
	///
	/// assert!(IssuePolicy::Strict.authorize(IssueAction::ChangeStatus, Some(&admin), None).is_ok());
	/// assert!(matches!(
	///     IssuePolicy::Strict.authorize(IssueAction::Create, Some(&admin), None),
	///     Err(Error::Forbidden(_))
	/// ));
	/// assert!(IssuePolicy::Permissive.authorize(IssueAction::ChangeStatus, None, None).is_ok());
	/// ```
	pub fn authorize(self, action: IssueAction, actor: Option<&User>, issue: Option<&Issue>) -> Result<()> {
		if actor.is_none() && action.always_requires_actor() {
			return Err(Error::NotAuthenticated);
		}
		if self == IssuePolicy::Permissive {
			return Ok(());
		}

		let actor = actor.ok_or(Error::NotAuthenticated)?;
		let allowed = match action {
			IssueAction::Create => actor.role == Role::Student,
			IssueAction::Edit | IssueAction::Delete => {
				issue.is_none_or(|issue| issue.is_authored_by(&actor.uid))
			}
			IssueAction::ChangeStatus | IssueAction::Annotate => actor.is_staff(),
			IssueAction::Vote => true,
		};

		if allowed {
			Ok(())
		} else {
			tracing::warn!(uid = %actor.uid, role = %actor.role, ?action, "Issue action denied");
			Err(Error::forbidden(format!("{} may not {}", actor.role, action.verb())))
		}
	}
}

impl fmt::Display for IssuePolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			IssuePolicy::Strict => "strict",
			IssuePolicy::Permissive => "permissive",
		})
	}
}

impl FromStr for IssuePolicy {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"strict" => Ok(IssuePolicy::Strict),
			"permissive" => Ok(IssuePolicy::Permissive),
			other => Err(Error::validation(format!("unknown issue policy: {other}"))),
		}
	}
}
