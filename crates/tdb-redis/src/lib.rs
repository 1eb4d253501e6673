//! Redis-backed key-value store for callback tokens and private-chat sessions.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, RedisError};
use tdb_core::{kv::KvBackend, Error, Result};

/// One multiplexed connection shared by every caller; clones are cheap handles to it.
#[derive(Clone)]
pub struct RedisKv {
    conn: MultiplexedConnection,
}

impl RedisKv {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| Error::Config(format!("invalid REDIS_URL: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;
        tracing::info!("connected to redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvBackend for RedisKv {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl))
            .await
            .map_err(unavailable)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(unavailable)
    }
}

fn unavailable(e: RedisError) -> Error {
    Error::Unavailable(format!("redis: {e}"))
}

/// Whole seconds for `SETEX`, rounded up; Redis rejects a zero expiry.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}
