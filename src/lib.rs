//! # Campus Voice
//!
//! A community issue tracker: students report campus problems, everyone
//! votes on them and staff triage them with a status and an official note.
//!
//! ## Architecture
//!
//! - [`core`]: issues, users, roles and the shared error type
//! - [`store`]: the durable and local storage backends with live snapshots
//! - [`auth`]: identity resolution, the [`Session`](auth::Session), issue
//!   permissions and the role-gated route table
//! - [`issues`]: the issue repository, pure projections and live feeds
//! - [`conf`]: layered settings
//! - [`app`]: [`App`], which wires the pieces above from [`Settings`](conf::Settings)
//! - [`logging`]: subscriber setup for binaries
//!
//! ## Example
//!
//! ```no_run
//! use voice::App;
//! use voice::conf::Settings;
//! use voice::core::{Category, NewIssue};
//!
//! # async fn run() -> voice::core::Result<()> {
//! let app = App::in_memory(Settings::load(None).expect("settings"));
//! app.start().await;
//! let user = app.sign_in_demo().await?;
//!
//! let repository = app.repository();
//! repository
//!     .create_issue(NewIssue::new("Broken AC", "Room 204", Category::Facility), Some(&user))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod logging;

pub use voice_auth as auth;
pub use voice_conf as conf;
pub use voice_core as core;
pub use voice_issues as issues;
pub use voice_store as store;

pub use app::App;
pub use logging::init_logging;
