//! User directory

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use voice_core::{Result, User};

/// Role-bearing user records keyed by uid.
#[async_trait]
pub trait UserDirectory: Send + Sync {
	async fn get(&self, uid: &str) -> Result<Option<User>>;

	/// Creates or overwrites the record for `user.uid`.
	async fn put(&self, user: User) -> Result<()>;
}

/// In-process [`UserDirectory`]. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserDirectory {
	users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryUserDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.users.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.users.read().await.is_empty()
	}
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
	async fn get(&self, uid: &str) -> Result<Option<User>> {
		Ok(self.users.read().await.get(uid).cloned())
	}

	async fn put(&self, user: User) -> Result<()> {
		self.users.write().await.insert(user.uid.clone(), user);
		Ok(())
	}
}
