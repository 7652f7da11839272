/// Repository layer: durable per-user key-value storage
use crate::errors::ApiResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Logical keys stored per user
pub const ALERTS_KEY: &str = "alerts";
pub const NOTIFICATIONS_KEY: &str = "notifications";
pub const HISTORY_KEY: &str = "history";

/// JSON values scoped by `(user_id, key)`. Last write wins.
#[derive(Clone)]
pub struct UserKvRepo {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Memory(Arc<Mutex<HashMap<(String, String), Value>>>),
}

impl UserKvRepo {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    /// Get the raw stored value
    pub async fn get(&self, user_id: &str, key: &str) -> ApiResult<Option<Value>> {
        match &self.backend {
            Backend::Postgres(pool) => {
                let row = sqlx::query_as::<_, (Value,)>(
                    "SELECT value FROM user_kv WHERE user_id = $1 AND key = $2",
                )
                .bind(user_id)
                .bind(key)
                .fetch_optional(pool)
                .await?;
                Ok(row.map(|(v,)| v))
            }
            Backend::Memory(map) => {
                let map = map.lock().unwrap_or_else(|e| e.into_inner());
                Ok(map.get(&(user_id.to_string(), key.to_string())).cloned())
            }
        }
    }

    /// Upsert a raw value
    pub async fn set(&self, user_id: &str, key: &str, value: Value) -> ApiResult<()> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO user_kv(user_id, key, value) VALUES ($1, $2, $3)
                     ON CONFLICT (user_id, key) DO UPDATE
                     SET value = EXCLUDED.value, updated_at = now()",
                )
                .bind(user_id)
                .bind(key)
                .bind(value)
                .execute(pool)
                .await?;
            }
            Backend::Memory(map) => {
                let mut map = map.lock().unwrap_or_else(|e| e.into_inner());
                map.insert((user_id.to_string(), key.to_string()), value);
            }
        }
        Ok(())
    }

    pub async fn delete(&self, user_id: &str, key: &str) -> ApiResult<()> {
        match &self.backend {
            Backend::Postgres(pool) => {
                sqlx::query("DELETE FROM user_kv WHERE user_id = $1 AND key = $2")
                    .bind(user_id)
                    .bind(key)
                    .execute(pool)
                    .await?;
            }
            Backend::Memory(map) => {
                let mut map = map.lock().unwrap_or_else(|e| e.into_inner());
                map.remove(&(user_id.to_string(), key.to_string()));
            }
        }
        Ok(())
    }

    /// Load a stored list, empty when nothing was saved yet
    pub async fn load_list<T: DeserializeOwned>(
        &self,
        user_id: &str,
        key: &str,
    ) -> ApiResult<Vec<T>> {
        match self.get(user_id, key).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn save_list<T: Serialize>(
        &self,
        user_id: &str,
        key: &str,
        items: &[T],
    ) -> ApiResult<()> {
        let value = serde_json::to_value(items)?;
        self.set(user_id, key, value).await
    }
}

/// Initialize database tables
pub async fn init_db(pool: &PgPool) -> ApiResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_kv(
            user_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (user_id, key)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_are_scoped_by_user() {
        let repo = UserKvRepo::in_memory();
        repo.save_list("alice", ALERTS_KEY, &[1, 2, 3]).await.unwrap();

        let alice: Vec<i32> = repo.load_list("alice", ALERTS_KEY).await.unwrap();
        let bob: Vec<i32> = repo.load_list("bob", ALERTS_KEY).await.unwrap();
        assert_eq!(alice, vec![1, 2, 3]);
        assert!(bob.is_empty());
    }

    #[tokio::test]
    async fn last_write_wins_and_delete_clears() {
        let repo = UserKvRepo::in_memory();
        repo.set("alice", HISTORY_KEY, serde_json::json!(["a"]))
            .await
            .unwrap();
        repo.set("alice", HISTORY_KEY, serde_json::json!(["b"]))
            .await
            .unwrap();
        assert_eq!(
            repo.get("alice", HISTORY_KEY).await.unwrap(),
            Some(serde_json::json!(["b"]))
        );

        repo.delete("alice", HISTORY_KEY).await.unwrap();
        assert_eq!(repo.get("alice", HISTORY_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_the_same_memory_store() {
        let repo = UserKvRepo::in_memory();
        let other = repo.clone();
        repo.save_list("u", NOTIFICATIONS_KEY, &["x"]).await.unwrap();
        let seen: Vec<String> = other.load_list("u", NOTIFICATIONS_KEY).await.unwrap();
        assert_eq!(seen, vec!["x".to_string()]);
    }
}
