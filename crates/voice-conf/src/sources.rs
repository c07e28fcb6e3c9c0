//! Configuration sources
//!
//! Each source yields a tree of JSON values. [`SettingsBuilder`](crate::SettingsBuilder)
//! merges the trees in priority order (environment > TOML file > defaults).

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of the environment variables read by [`EnvSource::new`].
pub const ENV_PREFIX: &str = "VOICE_";

/// Separator between nesting levels in environment variable names.
pub const ENV_NESTING: &str = "__";

/// A layer of configuration.
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Built-in values every other source overrides.
#[derive(Debug, Clone, Default)]
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a top-level value.
	///
	/// # Examples
	///
	/// ```
	/// use serde_json::json;
	/// use voice_conf::{ConfigSource, DefaultSource};
	///
	/// let source = DefaultSource::new().with_value("policy", json!("strict"));
	/// assert_eq!(source.load().unwrap()["policy"], json!("strict"));
	/// ```
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}

/// TOML configuration file. A missing file contributes nothing.
#[derive(Debug, Clone)]
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			tracing::debug!(path = %self.path.display(), "Config file not found, skipping");
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;
		let json_value = serde_json::to_value(toml_value)?;

		let map = json_value
			.as_object()
			.ok_or_else(|| SourceError::Parse("Expected table at root".to_string()))?;

		Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Prefixed environment variables.
///
/// `VOICE_STORAGE__SLOT=demo` becomes `{"storage": {"slot": "demo"}}`: the
/// prefix is stripped, the rest is lowercased and `__` separates nesting
/// levels. Values are kept as strings. Keyword settings (`policy`,
/// `demo.role`) are case-insensitive, so `VOICE_POLICY=Permissive` selects
/// the permissive policy; every other value is passed through unchanged.
#[derive(Debug, Clone)]
pub struct EnvSource {
	prefix: String,
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	/// Reads the process environment with the `VOICE_` prefix.
	pub fn new() -> Self {
		Self {
			prefix: ENV_PREFIX.to_string(),
			vars: None,
		}
	}

	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}

	/// Reads the given pairs instead of the process environment.
	///
	/// # Examples
	///
	/// ```
	/// use serde_json::json;
	/// use voice_conf::{ConfigSource, EnvSource};
	///
	/// let source = EnvSource::from_vars([("VOICE_LOGGING__FILTER", "debug")]);
	/// let config = source.load().unwrap();
	///
	/// assert_eq!(config["logging"], json!({"filter": "debug"}));
	/// ```
	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			prefix: ENV_PREFIX.to_string(),
			vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
		}
	}

	fn vars(&self) -> Vec<(String, String)> {
		match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let mut config = IndexMap::new();

		for (key, value) in self.vars() {
			let Some(rest) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			let path: Vec<String> = rest
				.split(ENV_NESTING)
				.map(str::to_lowercase)
				.collect();
			if path.iter().any(String::is_empty) {
				tracing::warn!(variable = %key, "Ignoring malformed settings variable");
				continue;
			}
			let value = if is_keyword(&path) {
				value.trim().to_lowercase()
			} else {
				value
			};
			insert_path(&mut config, &path, Value::String(value));
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}

/// Settings whose values name an enum variant.
const KEYWORD_KEYS: &[&[&str]] = &[&["policy"], &["demo", "role"]];

fn is_keyword(path: &[String]) -> bool {
	KEYWORD_KEYS
		.iter()
		.any(|keys| keys.iter().copied().eq(path.iter().map(String::as_str)))
}

fn insert_path(config: &mut IndexMap<String, Value>, path: &[String], value: Value) {
	let Some((head, rest)) = path.split_first() else {
		return;
	};
	let entry = config.entry(head.clone()).or_insert(Value::Null);
	nest(entry, rest, value);
}

fn nest(node: &mut Value, path: &[String], value: Value) {
	let Some((head, rest)) = path.split_first() else {
		*node = value;
		return;
	};
	if !node.is_object() {
		*node = Value::Object(Map::new());
	}
	if let Value::Object(map) = node {
		nest(map.entry(head.clone()).or_insert(Value::Null), rest, value);
	}
}
