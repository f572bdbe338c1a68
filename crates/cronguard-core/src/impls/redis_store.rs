//! RedisStore - 本番用の KeyValueStore
//!
//! # 実装詳細
//! - `ConnectionManager` が切断時の再接続を自動で行う（clone は安価）
//! - set_if_absent は `SET key value NX EX ttl`
//! - compare_and_delete は Lua スクリプトでサーバー側アトミックに実行

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::ports::{KeyValueStore, StoreError};

const COMPARE_AND_DELETE: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
";

pub struct RedisStore {
    manager: ConnectionManager,
    compare_and_delete: redis::Script,
}

impl RedisStore {
    /// Connect to `url` (`redis://host:port/db` or `rediss://...`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Command(format!("invalid redis url: {e}")))?;
        let manager = ConnectionManager::new(client).await.map_err(classify)?;
        tracing::info!(%url, "connected to redis");
        Ok(Self {
            manager,
            compare_and_delete: redis::Script::new(COMPARE_AND_DELETE),
        })
    }
}

fn classify(error: redis::RedisError) -> StoreError {
    if error.is_io_error()
        || error.is_connection_dropped()
        || error.is_connection_refusal()
        || error.is_timeout()
    {
        StoreError::Unavailable(error.to_string())
    } else {
        StoreError::Command(error.to_string())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        // EX 0 はエラーになるので最低 1 秒
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(classify)?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let deleted: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(classify)?;
        Ok(deleted > 0)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: () = conn.set(key, value).await.map_err(classify)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(classify)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.hset(key, field, value).await.map_err(classify)?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.hgetall(key).await.map_err(classify)
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        conn.incr(key, 1_i64).await.map_err(classify)
    }
}
