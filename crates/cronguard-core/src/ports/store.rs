//! KeyValueStore port - 全プロセスが共有するキーバリューストア
//!
//! ロック・メトリクスはすべてこの trait 越しにストアへアクセスします。
//!
//! # 設計原則
//! - 各メソッドはストア上で単一のアトミック操作として実行される
//! - 呼び出し側での read-modify-write は禁止（他プロセスと競合するため）
//! - 値はすべて文字列として保存する

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

/// StoreError はストア操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, dropped, timed out).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store answered but rejected the command.
    #[error("store command failed: {0}")]
    Command(String),
}

/// The operations the lock and metrics services need from the shared store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set `key` to `value` with expiry `ttl`, only if `key` has no live value.
    /// Returns whether the value was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Delete `key` only if its current value equals `expected`.
    /// Returns whether a deletion happened.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Unconditional set without expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// All fields of the hash at `key` (empty when absent).
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Atomically add one to the integer at `key` (missing counts as 0).
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;
}
