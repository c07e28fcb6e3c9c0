//! # Voice Auth
//!
//! Who the current principal is, what they may do, and which routes they may
//! reach.
//!
//! ## Architecture
//!
//! - [`account`]: the [`AuthService`] identity provider contract and
//!   [`MemoryAuthService`], with Argon2 password hashing
//! - [`directory`]: the [`UserDirectory`] of role-bearing user records
//! - [`resolver`]: [`IdentityResolver`], which turns a provider [`Account`] into
//!   an application [`User`](voice_core::User)
//! - [`session`]: [`Session`], the explicit owner of the signed-in state and of
//!   the backend choice
//! - [`permissions`]: [`IssuePolicy`], the repository's authorization rules
//! - [`gate`]: [`AccessGate`], the role-gated route table
//!
//! ## Example
//!
//! ```
//! use voice_auth::{AccessGate, AuthState, Decision};
//!
//! let gate = AccessGate::application();
//! let decision = gate.evaluate(&AuthState::Unauthenticated, "/dashboard");
//!
//! assert_eq!(decision, Decision::Redirect("/login".to_string()));
//! ```

pub mod account;
pub mod directory;
pub mod gate;
pub mod hasher;
pub mod permissions;
pub mod resolver;
pub mod session;

pub use account::{Account, AuthService, MemoryAuthService};
pub use directory::{MemoryUserDirectory, UserDirectory};
pub use gate::{Access, AccessGate, Decision, GateError, Route, RouteMatch, RoutePattern};
pub use hasher::{Argon2Hasher, PasswordHasher};
pub use permissions::{IssueAction, IssuePolicy};
pub use resolver::{IdentityResolver, Resolution};
pub use session::{AuthState, DemoProfile, MIN_PASSWORD_CHARS, Session};
