//! # Voice Conf
//!
//! Layered settings for Campus Voice.
//!
//! ## Architecture
//!
//! - [`sources`]: configuration layers (defaults, TOML file, `VOICE_*` environment)
//! - [`settings`]: the typed [`Settings`] tree, the merging [`SettingsBuilder`]
//!   and validation
//!
//! ## Example
//!
//! ```toml
//! policy = "strict"
//!
//! [storage]
//! cache_dir = ".campus-voice"
//! slot = "demo_issues"
//!
//! [logging]
//! filter = "voice=debug,info"
//!
//! [demo]
//! display_name = "Demo User"
//! role = "student"
//! ```
//!
//! Every key can be overridden from the environment, for example
//! `VOICE_STORAGE__SLOT=team_issues`.

pub mod settings;
pub mod sources;

pub use settings::{
	DemoSettings, LoggingSettings, Settings, SettingsBuilder, SettingsError, StorageSettings,
	default_source,
};
pub use sources::{
	ConfigSource, DefaultSource, ENV_NESTING, ENV_PREFIX, EnvSource, SourceError, TomlFileSource,
};
