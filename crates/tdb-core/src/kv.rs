use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::Result;

/// Networked key-value store with per-key expiry (Redis `SET key value EX seconds` / `GET key`).
///
/// Expiry is owned by the backend; callers never poll or delete.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
}

/// In-process backend on the tokio clock.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Overwrite a raw value in place, keeping its expiry.
    #[cfg(test)]
    pub async fn corrupt(&self, key: &str, raw: &str) {
        if let Some(entry) = self.entries.lock().await.get_mut(key) {
            entry.0 = raw.to_string();
        }
    }
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some((_, expires_at)) => Instant::now() >= *expires_at,
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(v, _)| v.clone()))
    }
}
