//! Local key/value cache
//!
//! A [`LocalCache`] stores opaque text under named slots. Slots are read and
//! written whole; there is no partial update.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use voice_core::{Error, Result};

/// Slot-addressed text storage on the local device.
#[async_trait]
pub trait LocalCache: Send + Sync {
	/// Contents of `slot`, or `None` if it was never written.
	async fn read(&self, slot: &str) -> Result<Option<String>>;

	/// Replaces the contents of `slot`.
	async fn write(&self, slot: &str, contents: &str) -> Result<()>;

	/// Removes `slot`. Clearing a missing slot succeeds.
	async fn clear(&self, slot: &str) -> Result<()>;
}

#[async_trait]
impl<T: LocalCache + ?Sized> LocalCache for Arc<T> {
	async fn read(&self, slot: &str) -> Result<Option<String>> {
		(**self).read(slot).await
	}

	async fn write(&self, slot: &str, contents: &str) -> Result<()> {
		(**self).write(slot, contents).await
	}

	async fn clear(&self, slot: &str) -> Result<()> {
		(**self).clear(slot).await
	}
}

/// Cache backed by one file per slot under a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
	root: PathBuf,
}

impl FileCache {
	/// Creates a cache rooted at `root`. The directory is created on first write.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Directory holding the slot files.
	pub fn root(&self) -> &Path {
		&self.root
	}

	fn slot_path(&self, slot: &str) -> Result<PathBuf> {
		let valid = !slot.is_empty()
			&& slot
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
			&& !slot.starts_with('.');
		if !valid {
			return Err(Error::validation(format!("invalid cache slot name: {slot:?}")));
		}
		Ok(self.root.join(format!("{slot}.json")))
	}
}

#[async_trait]
impl LocalCache for FileCache {
	async fn read(&self, slot: &str) -> Result<Option<String>> {
		let path = self.slot_path(slot)?;
		match tokio::fs::read_to_string(&path).await {
			Ok(contents) => Ok(Some(contents)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	async fn write(&self, slot: &str, contents: &str) -> Result<()> {
		let path = self.slot_path(slot)?;
		tokio::fs::create_dir_all(&self.root).await?;

		// Write beside the target, then rename over it
		let tmp_path = path.with_extension("json.tmp");
		tokio::fs::write(&tmp_path, contents).await?;
		if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
			let _ = tokio::fs::remove_file(&tmp_path).await;
			return Err(e.into());
		}

		tracing::trace!(slot, path = %path.display(), bytes = contents.len(), "Cache slot written");
		Ok(())
	}

	async fn clear(&self, slot: &str) -> Result<()> {
		let path = self.slot_path(slot)?;
		match tokio::fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

/// In-process cache, used by tests and by demo sessions that need no
/// persistence across runs.
#[derive(Debug, Default)]
pub struct MemoryCache {
	slots: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl LocalCache for MemoryCache {
	async fn read(&self, slot: &str) -> Result<Option<String>> {
		Ok(self.slots.read().get(slot).cloned())
	}

	async fn write(&self, slot: &str, contents: &str) -> Result<()> {
		self.slots.write().insert(slot.to_string(), contents.to_string());
		Ok(())
	}

	async fn clear(&self, slot: &str) -> Result<()> {
		self.slots.write().remove(slot);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_file_cache_round_trip() {
		let dir = TempDir::new().unwrap();
		let cache = FileCache::new(dir.path().join("nested"));

		assert_eq!(cache.read("issues").await.unwrap(), None);
		cache.write("issues", "[1]").await.unwrap();
		cache.write("issues", "[1,2]").await.unwrap();

		assert_eq!(cache.read("issues").await.unwrap().as_deref(), Some("[1,2]"));
		assert!(!dir.path().join("nested/issues.json.tmp").exists());
	}

	#[tokio::test]
	async fn test_file_cache_clear_missing_slot() {
		let dir = TempDir::new().unwrap();
		let cache = FileCache::new(dir.path());

		cache.clear("never-written").await.unwrap();
		cache.write("slot", "x").await.unwrap();
		cache.clear("slot").await.unwrap();

		assert_eq!(cache.read("slot").await.unwrap(), None);
	}

	#[rstest]
	#[case("")]
	#[case("../escape")]
	#[case("a/b")]
	#[case(".hidden")]
	#[tokio::test]
	async fn test_file_cache_rejects_bad_slot(#[case] slot: &str) {
		let dir = TempDir::new().unwrap();
		let cache = FileCache::new(dir.path());

		let result = cache.write(slot, "x").await;

		assert!(matches!(result, Err(Error::Validation(_))));
	}

	#[tokio::test]
	async fn test_memory_cache() {
		let cache = MemoryCache::new();
		cache.write("a", "1").await.unwrap();

		assert_eq!(cache.read("a").await.unwrap().as_deref(), Some("1"));
		cache.clear("a").await.unwrap();
		assert_eq!(cache.read("a").await.unwrap(), None);
	}
}
