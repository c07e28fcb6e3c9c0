//! Settings
//!
//! [`Settings`] is deserialized from the merged output of every registered
//! [`ConfigSource`]. Keys no source provides fall back to the field defaults,
//! so an empty configuration is a valid one.

use crate::sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use voice_auth::{DemoProfile, IssuePolicy};
use voice_core::{Role, user::normalize_official_id};
use voice_store::DEFAULT_SLOT;

/// Error type for loading settings
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Failed to load {source_name}: {error}")]
	Source {
		source_name: String,
		#[source]
		error: SourceError,
	},

	#[error("Invalid settings: {0}")]
	Deserialize(#[from] serde_json::Error),

	#[error("Invalid value for '{key}': {message}")]
	InvalidValue { key: String, message: String },
}

impl SettingsError {
	fn invalid(key: &str, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			key: key.to_string(),
			message: message.into(),
		}
	}
}

/// Where the local backend keeps its collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
	/// Directory holding one JSON file per slot
	pub cache_dir: PathBuf,
	/// Slot name of the demo collection
	pub slot: String,
}

impl Default for StorageSettings {
	fn default() -> Self {
		Self {
			cache_dir: PathBuf::from(".campus-voice"),
			slot: DEFAULT_SLOT.to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
	/// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
	pub filter: String,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			filter: "info".to_string(),
		}
	}
}

/// The principal a demo session signs in as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
	pub display_name: String,
	pub email: String,
	/// Fixed uid suffix, so repeated runs act as the same demo user
	pub handle: Option<String>,
	pub role: Role,
	pub official_id: Option<String>,
}

impl Default for DemoSettings {
	fn default() -> Self {
		let profile = DemoProfile::default();
		Self {
			display_name: profile.display_name,
			email: profile.email,
			handle: Some("local".to_string()),
			role: Role::Student,
			official_id: None,
		}
	}
}

impl DemoSettings {
	pub fn profile(&self) -> DemoProfile {
		DemoProfile {
			display_name: self.display_name.clone(),
			email: self.email.clone(),
			handle: self.handle.clone(),
		}
	}
}

/// Application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub storage: StorageSettings,
	pub policy: IssuePolicy,
	pub logging: LoggingSettings,
	pub demo: DemoSettings,
}

impl Settings {
	/// Loads defaults, then `config_file` if given, then `VOICE_*` variables.
	pub fn load(config_file: Option<&Path>) -> Result<Self, SettingsError> {
		let mut builder = SettingsBuilder::new().add_source(EnvSource::new());
		if let Some(path) = config_file {
			builder = builder.add_source(TomlFileSource::new(path));
		}
		builder.build()
	}

	/// Checks constraints serde cannot express.
	pub fn validate(&self) -> Result<(), SettingsError> {
		let slot = self.storage.slot.as_str();
		if slot.trim().is_empty() {
			return Err(SettingsError::invalid("storage.slot", "must not be empty"));
		}
		if slot.starts_with('.')
			|| !slot
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
		{
			return Err(SettingsError::invalid(
				"storage.slot",
				format!("{slot:?} is not a valid file name"),
			));
		}
		if self.logging.filter.trim().is_empty() {
			return Err(SettingsError::invalid("logging.filter", "must not be empty"));
		}
		if self.demo.display_name.trim().is_empty() {
			return Err(SettingsError::invalid("demo.display_name", "must not be empty"));
		}
		normalize_official_id(self.demo.role, self.demo.official_id.clone())
			.map_err(|e| SettingsError::invalid("demo.official_id", e.to_string()))?;
		Ok(())
	}
}

/// Merges sources by priority and produces validated [`Settings`].
///
/// A [`DefaultSource`] holding [`Settings::default`] is always present at the
/// lowest priority.
///
/// # Examples
///
/// ```
/// use voice_conf::{EnvSource, SettingsBuilder};
/// use voice_auth::IssuePolicy;
///
/// let settings = SettingsBuilder::new()
///     .add_source(EnvSource::from_vars([("VOICE_POLICY", "permissive")]))
///     .build()
///     .unwrap();
///
/// assert_eq!(settings.policy, IssuePolicy::Permissive);
/// assert_eq!(settings.storage.slot, "demo_issues");
/// ```
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self {
			sources: Vec::new(),
		}
	}

	pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Merged value tree before deserialization.
	pub fn merged(&self) -> Result<Value, SettingsError> {
		let defaults = match serde_json::to_value(Settings::default())? {
			Value::Object(map) => map,
			_ => Map::new(),
		};
		let mut merged = Value::Object(defaults);

		let mut sources: Vec<&dyn ConfigSource> = self.sources.iter().map(|source| &**source).collect();
		sources.sort_by_key(|source| source.priority());

		for source in sources {
			let layer = source.load().map_err(|error| SettingsError::Source {
				source_name: source.description(),
				error,
			})?;
			tracing::debug!(source = %source.description(), keys = layer.len(), "Settings layer loaded");
			merge(&mut merged, Value::Object(layer.into_iter().collect()));
		}
		Ok(merged)
	}

	pub fn build(self) -> Result<Settings, SettingsError> {
		let settings: Settings = serde_json::from_value(self.merged()?)?;
		settings.validate()?;
		Ok(settings)
	}
}

impl Default for SettingsBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for SettingsBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let sources: Vec<_> = self.sources.iter().map(|s| s.description()).collect();
		f.debug_struct("SettingsBuilder").field("sources", &sources).finish()
	}
}

/// Tables merge key by key; any other value replaces what was there.
fn merge(base: &mut Value, layer: Value) {
	match (base, layer) {
		(Value::Object(base), Value::Object(layer)) => {
			for (key, value) in layer {
				match base.get_mut(&key) {
					Some(existing) => merge(existing, value),
					None => {
						base.insert(key, value);
					}
				}
			}
		}
		(base, layer) => *base = layer,
	}
}

/// Defaults expressed as a source, for callers assembling layers by hand.
pub fn default_source() -> Result<DefaultSource, SettingsError> {
	let Value::Object(map) = serde_json::to_value(Settings::default())? else {
		return Ok(DefaultSource::new());
	};
	Ok(map
		.into_iter()
		.fold(DefaultSource::new(), |source, (key, value)| source.with_value(key, value)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[test]
	fn test_defaults() {
		let settings = SettingsBuilder::new().build().unwrap();

		assert_eq!(settings, Settings::default());
		assert_eq!(settings.storage.slot, DEFAULT_SLOT);
		assert_eq!(settings.policy, IssuePolicy::Strict);
		assert_eq!(settings.demo.display_name, "Demo User");
		assert_eq!(settings.demo.email, "demo@example.com");
	}

	#[test]
	fn test_merge_keeps_sibling_keys() {
		let mut base = json!({"storage": {"slot": "a", "cache_dir": "/x"}, "policy": "strict"});

		merge(&mut base, json!({"storage": {"slot": "b"}}));

		assert_eq!(
			base,
			json!({"storage": {"slot": "b", "cache_dir": "/x"}, "policy": "strict"})
		);
	}

	#[test]
	fn test_higher_priority_wins_regardless_of_order() {
		let settings = SettingsBuilder::new()
			.add_source(EnvSource::from_vars([("VOICE_STORAGE__SLOT", "from_env")]))
			.add_source(DefaultSource::new().with_value("storage", json!({"slot": "from_defaults"})))
			.build()
			.unwrap();

		assert_eq!(settings.storage.slot, "from_env");
	}

	#[rstest]
	#[case("VOICE_STORAGE__SLOT", "", "storage.slot")]
	#[case("VOICE_STORAGE__SLOT", "../escape", "storage.slot")]
	#[case("VOICE_LOGGING__FILTER", " ", "logging.filter")]
	#[case("VOICE_DEMO__ROLE", "admin", "demo.official_id")]
	fn test_validation_rejects(#[case] var: &str, #[case] value: &str, #[case] key: &str) {
		let result = SettingsBuilder::new()
			.add_source(EnvSource::from_vars([(var, value)]))
			.build();

		assert!(
			matches!(&result, Err(SettingsError::InvalidValue { key: k, .. }) if k == key),
			"unexpected result: {result:?}"
		);
	}

	#[test]
	fn test_unknown_policy_is_a_deserialize_error() {
		let result = SettingsBuilder::new()
			.add_source(EnvSource::from_vars([("VOICE_POLICY", "lenient")]))
			.build();

		assert!(matches!(result, Err(SettingsError::Deserialize(_))));
	}

	#[test]
	fn test_env_policy_is_case_insensitive() {
		let settings = SettingsBuilder::new()
			.add_source(EnvSource::from_vars([("VOICE_POLICY", "Permissive")]))
			.build()
			.unwrap();

		assert_eq!(settings.policy, IssuePolicy::Permissive);
	}

	#[test]
	fn test_staff_demo_with_official_id() {
		let settings = SettingsBuilder::new()
			.add_source(EnvSource::from_vars([
				("VOICE_DEMO__ROLE", "management"),
				("VOICE_DEMO__OFFICIAL_ID", "MGT-4"),
			]))
			.build()
			.unwrap();

		assert_eq!(settings.demo.role, Role::Management);
		assert_eq!(settings.demo.official_id.as_deref(), Some("MGT-4"));
	}

	#[test]
	fn test_default_source_round_trips() {
		let settings = SettingsBuilder::new()
			.add_source(default_source().unwrap())
			.build()
			.unwrap();

		assert_eq!(settings, Settings::default());
	}
}
