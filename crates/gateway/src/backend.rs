use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use taskboard_contracts::UserRole;
use taskboard_store::{Store, StoreError};

use crate::config::{GatewayConfig, StartupError, StoreMode};

/// Privilege oracle and durable admin operations behind a mode dispatch:
/// Postgres in production, an in-process map for local development and
/// tests. Every admin-route request consults `is_administrator` freshly;
/// nothing here caches privilege across requests.
#[derive(Clone)]
pub enum Backend {
    Pg(Store),
    Memory(MemoryStore),
}

impl Backend {
    pub async fn from_config(config: &GatewayConfig) -> Result<Self, StartupError> {
        match config.store_mode {
            StoreMode::Postgres => {
                let Some(db_url) = config.db_url.as_deref() else {
                    return Err(StartupError {
                        code: "ERR_MISSING_CONFIG",
                        message: "postgres store mode requires TASKBOARD_DB_URL".to_string(),
                    });
                };

                let store = Store::connect_and_migrate(db_url, config.db_query_timeout())
                    .await
                    .map_err(|err| StartupError {
                        code: "ERR_DB_UNAVAILABLE",
                        message: format!("failed to connect to database: {}", err),
                    })?;

                Ok(Backend::Pg(store))
            }
            StoreMode::Memory => {
                let memory = MemoryStore::default();
                for id in &config.memory_admin_ids {
                    memory.seed_user(*id, UserRole::Admin);
                }
                Ok(Backend::Memory(memory))
            }
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Backend::Pg(store) => store.ping().await,
            Backend::Memory(_) => Ok(()),
        }
    }

    pub async fn is_administrator(&self, user_id: i64) -> Result<bool, StoreError> {
        match self {
            Backend::Pg(store) => store.is_administrator(user_id).await,
            Backend::Memory(memory) => Ok(memory.is_administrator(user_id)),
        }
    }

    pub async fn update_user_role(
        &self,
        user_id: i64,
        role: UserRole,
    ) -> Result<bool, StoreError> {
        match self {
            Backend::Pg(store) => store.update_user_role(user_id, role).await,
            Backend::Memory(memory) => Ok(memory.update_user_role(user_id, role)),
        }
    }

    pub async fn delete_comment(&self, comment_id: i64) -> Result<bool, StoreError> {
        match self {
            Backend::Pg(store) => store.delete_comment(comment_id).await,
            Backend::Memory(memory) => Ok(memory.delete_comment(comment_id)),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    users: HashMap<i64, UserRole>,
    comments: HashMap<i64, String>,
}

impl MemoryStore {
    pub fn seed_user(&self, user_id: i64, role: UserRole) {
        self.lock().users.insert(user_id, role);
    }

    pub fn seed_comment(&self, comment_id: i64, content: &str) {
        self.lock().comments.insert(comment_id, content.to_string());
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }

    fn is_administrator(&self, user_id: i64) -> bool {
        self.lock().users.get(&user_id) == Some(&UserRole::Admin)
    }

    fn update_user_role(&self, user_id: i64, role: UserRole) -> bool {
        let mut inner = self.lock();
        match inner.users.get_mut(&user_id) {
            Some(existing) => {
                *existing = role;
                true
            }
            None => false,
        }
    }

    fn delete_comment(&self, comment_id: i64) -> bool {
        self.lock().comments.remove(&comment_id).is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_tracks_role_changes() {
        let memory = MemoryStore::default();
        memory.seed_user(1, UserRole::User);

        assert!(!memory.is_administrator(1));
        assert!(memory.update_user_role(1, UserRole::Admin));
        assert!(memory.is_administrator(1));

        assert!(!memory.update_user_role(2, UserRole::Admin));
        assert!(!memory.is_administrator(2));
    }

    #[test]
    fn memory_store_comment_deletion_is_idempotent() {
        let memory = MemoryStore::default();
        memory.seed_comment(10, "first");

        assert!(memory.delete_comment(10));
        assert!(!memory.delete_comment(10));
        assert_eq!(memory.comment_count(), 0);
    }
}
