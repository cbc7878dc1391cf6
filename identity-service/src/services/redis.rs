use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::collections::HashMap;
use tokio::time::{Duration, Instant};

/// Key-value cache holding short-lived hashes.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write all `fields` under `key` and expire the key after `ttl_seconds`.
    async fn set_hash_with_ttl(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl_seconds: u64,
    ) -> Result<(), anyhow::Error>;

    /// All fields stored under `key`; empty when the key is missing or expired.
    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, anyhow::Error>;

    /// Remove `key`; missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl KeyValueStore for RedisService {
    async fn set_hash_with_ttl(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl_seconds: u64,
    ) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let ttl = i64::try_from(ttl_seconds)?;

        // MULTI/EXEC so the hash never exists without its expiry.
        redis::pipe()
            .atomic()
            .hset_multiple(key, fields)
            .ignore()
            .expire(key, ttl)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to store hash: {}", e))
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        conn.hgetall(key)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read hash: {}", e))
    }

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete key: {}", e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

struct MockEntry {
    fields: HashMap<String, String>,
    expires_at: Instant,
}

/// In-memory store honouring TTLs against the tokio clock, so tests can
/// `tokio::time::advance` past an expiry.
pub struct MockKeyValueStore {
    entries: std::sync::Mutex<HashMap<String, MockEntry>>,
}

impl Default for MockKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKeyValueStore {
    pub fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Keys that have not yet expired.
    pub fn live_keys(&self) -> Result<Vec<String>, anyhow::Error> {
        let now = Instant::now();
        let entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock cache mutex poisoned: {}", e))?;
        Ok(entries
            .iter()
            .filter(|(_, entry)| entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect())
    }

    /// Seconds left before `key` expires, if it is live.
    pub fn ttl(&self, key: &str) -> Result<Option<u64>, anyhow::Error> {
        let now = Instant::now();
        let entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock cache mutex poisoned: {}", e))?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at.duration_since(now).as_secs()))
    }
}

#[async_trait]
impl KeyValueStore for MockKeyValueStore {
    async fn set_hash_with_ttl(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl_seconds: u64,
    ) -> Result<(), anyhow::Error> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock cache mutex poisoned: {}", e))?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| MockEntry {
            fields: HashMap::new(),
            expires_at: Instant::now(),
        });
        for (field, value) in fields {
            entry.fields.insert(field.to_string(), value.clone());
        }
        entry.expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, anyhow::Error> {
        let now = Instant::now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock cache mutex poisoned: {}", e))?;

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(entry.fields.clone()),
            Some(_) => {
                entries.remove(key);
                Ok(HashMap::new())
            }
            None => Ok(HashMap::new()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        self.entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock cache mutex poisoned: {}", e))?
            .remove(key);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn mock_store_expires_entries() {
        let store = MockKeyValueStore::new();
        store
            .set_hash_with_ttl("k", &[("a", "1".to_string())], 10)
            .await
            .unwrap();

        assert_eq!(store.get_hash("k").await.unwrap().len(), 1);
        assert_eq!(store.ttl("k").unwrap(), Some(10));

        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(store.get_hash("k").await.unwrap().is_empty());
        assert!(store.live_keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mock_store_deletes_entries() {
        let store = MockKeyValueStore::new();
        store
            .set_hash_with_ttl("k", &[("a", "1".to_string())], 10)
            .await
            .unwrap();

        store.delete("k").await.unwrap();
        store.delete("missing").await.unwrap();

        assert!(store.get_hash("k").await.unwrap().is_empty());
        assert!(store.live_keys().unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires running Redis
    async fn redis_round_trip() {
        let config = crate::config::RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
        };
        let redis = RedisService::new(&config).await.unwrap();
        redis
            .set_hash_with_ttl("test:hash", &[("field", "value".to_string())], 5)
            .await
            .unwrap();
        let fields = redis.get_hash("test:hash").await.unwrap();
        assert_eq!(fields.get("field").map(String::as_str), Some("value"));
    }
}
