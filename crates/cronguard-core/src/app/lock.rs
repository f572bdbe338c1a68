//! DistributedLock - 共有ストア上の fencing token 付きロック
//!
//! # 設計原則
//! - acquire は 1 回だけ試行する（内部でリトライ・ブロックしない）
//! - release は token が一致するときだけ削除する（ストア側でアトミック）
//! - デッドロック防止は TTL のみ。TTL はタスクの想定実行時間より長くすること

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::TaskKeys;
use crate::ports::{KeyValueStore, StoreError, TokenGenerator};

/// Proof of ownership for one acquisition.
#[derive(Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LockToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// token は所有権の証明なのでログに全体を出さない
impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "LockToken({prefix}…)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Lock status unknown: the store could not answer the acquire.
    #[error("lock store unavailable for '{task}': {source}")]
    LockStoreUnavailable {
        task: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to release lock for '{task}': {source}")]
    LockReleaseFailure {
        task: String,
        #[source]
        source: StoreError,
    },
}

pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
    tokens: Arc<dyn TokenGenerator>,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn KeyValueStore>, tokens: Arc<dyn TokenGenerator>) -> Self {
        Self { store, tokens }
    }

    /// Try once to take the lock for `name`.
    ///
    /// `Ok(None)` means a live lock is held elsewhere; that is contention, not an error.
    pub async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockToken>, LockError> {
        let key = TaskKeys::for_task(name).lock;
        let token = LockToken(self.tokens.generate());
        let acquired = self
            .store
            .set_if_absent(&key, token.as_str(), ttl)
            .await
            .map_err(|source| LockError::LockStoreUnavailable {
                task: name.to_string(),
                source,
            })?;
        Ok(acquired.then_some(token))
    }

    /// Delete the lock for `name` if, and only if, it still holds `token`.
    ///
    /// Returns `false` when the lock expired, was taken over, or never existed.
    pub async fn release(&self, name: &str, token: &LockToken) -> Result<bool, LockError> {
        let key = TaskKeys::for_task(name).lock;
        self.store
            .compare_and_delete(&key, token.as_str())
            .await
            .map_err(|source| LockError::LockReleaseFailure {
                task: name.to_string(),
                source,
            })
    }
}
