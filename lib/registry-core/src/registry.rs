//! User registry keyed by user id

use crate::{CoreError, Result, User, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// UserRegistry holds at most one `User` per id.
///
/// Every operation goes through a single map-wide lock, so a read always
/// observes the most recent committed write for its key. Cloning the
/// registry shares the underlying map.
#[derive(Clone)]
pub struct UserRegistry {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a user, replacing any record already stored under its id
    pub async fn upsert(&self, user: User) -> User {
        let mut users = self.users.write().await;
        let replaced = users.insert(user.id, user.clone()).is_some();

        debug!(user_id = user.id, replaced, "Stored user");
        user
    }

    /// Get the current record for a user
    pub async fn get(&self, id: UserId) -> Result<User> {
        let users = self.users.read().await;
        users.get(&id).cloned().ok_or(CoreError::UserNotFound(id))
    }

    /// Remove a user. Returns `false` if nothing was stored under `id`.
    pub async fn delete(&self, id: UserId) -> bool {
        let mut users = self.users.write().await;
        let removed = users.remove(&id).is_some();

        debug!(user_id = id, removed, "Deleted user");
        removed
    }

    /// Get count of registered users
    pub async fn len(&self) -> usize {
        let users = self.users.read().await;
        users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for UserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
