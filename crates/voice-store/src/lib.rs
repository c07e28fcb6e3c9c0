//! # Voice Store
//!
//! Storage backends for the issue collection.
//!
//! ## Architecture
//!
//! - [`backend`]: the [`StorageBackend`] capability the repository is written against,
//!   and [`StorageBackends`], the pair a session picks from
//! - [`remote`]: [`RemoteBackend`], an adapter over any durable [`IssueStore`]
//! - [`local`]: [`LocalBackend`], which keeps the whole collection in one
//!   [`LocalCache`] slot
//! - [`store`]: the [`IssueStore`] contract and [`MemoryIssueStore`], an in-process
//!   implementation with live listeners
//! - [`cache`]: the [`LocalCache`] contract with file and memory implementations
//! - [`subscription`]: snapshot listeners and the [`Subscription`] guard that
//!   unregisters them
//!
//! Both backends deliver snapshots, never diffs: every listener call carries the
//! complete current result set, newest first.

pub mod backend;
pub mod cache;
pub mod local;
pub mod remote;
pub mod store;
pub mod subscription;

pub use backend::{IssueScope, StorageBackend, StorageBackends, newest_first};
pub use cache::{FileCache, LocalCache, MemoryCache};
pub use local::{DEFAULT_SLOT, LocalBackend};
pub use remote::RemoteBackend;
pub use store::{IssueStore, MemoryIssueStore};
pub use subscription::{ListenerSet, SnapshotListener, SnapshotResult, Subscription, listener};
