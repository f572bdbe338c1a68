//! InMemoryStore - 開発・テスト用の KeyValueStore
//!
//! # 実装詳細
//! - HashMap<String, Entry> を 1 つの Mutex で保護（各操作がアトミック）
//! - TTL は Clock で判定し、期限切れのキーはアクセス時に削除
//! - Redis と同じく SET は TTL を消す、文字列とハッシュの型違いはエラー
//!
//! 1 プロセス内の複数 "ノード" で共有すれば、フリート全体の挙動をテストできます。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ports::{Clock, KeyValueStore, StoreError, SystemClock};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store poisoned".to_string()))
    }

    /// Live entry for `key`; an expired one is removed first.
    fn live_entry<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut Entry> {
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Command(format!(
        "WRONGTYPE operation against key '{key}' holding the wrong kind of value"
    ))
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        if Self::live_entry(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Command(format!("invalid expire time: {e}")))?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        let matches = matches!(
            Self::live_entry(&mut entries, key, now),
            Some(Entry { value: Value::Text(current), .. }) if current == expected
        );
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        match Self::live_entry(&mut entries, key, now) {
            None => Ok(None),
            Some(Entry { value: Value::Text(text), .. }) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        match Self::live_entry(&mut entries, key, now) {
            Some(Entry { value: Value::Hash(hash), .. }) => {
                hash.insert(field.to_string(), value.to_string());
                Ok(())
            }
            Some(_) => Err(wrong_type(key)),
            None => {
                let hash = HashMap::from([(field.to_string(), value.to_string())]);
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Hash(hash),
                        expires_at: None,
                    },
                );
                Ok(())
            }
        }
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        match Self::live_entry(&mut entries, key, now) {
            None => Ok(HashMap::new()),
            Some(Entry { value: Value::Hash(hash), .. }) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        let next = match Self::live_entry(&mut entries, key, now) {
            None => 1,
            Some(Entry { value: Value::Text(text), .. }) => text
                .parse::<i64>()
                .ok()
                .and_then(|n| n.checked_add(1))
                .ok_or_else(|| {
                    StoreError::Command("value is not an integer or out of range".to_string())
                })?,
            Some(_) => return Err(wrong_type(key)),
        };
        let expires_at = entries.get(key).and_then(|entry| entry.expires_at);
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(next.to_string()),
                expires_at,
            },
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;

    fn store_with_clock() -> (InMemoryStore, FixedClock) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        (InMemoryStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn set_if_absent_respects_live_value() {
        let (store, _clock) = store_with_clock();
        assert!(store.set_if_absent("k", "a", Duration::from_secs(5)).await.unwrap());
        assert!(!store.set_if_absent("k", "b", Duration::from_secs(5)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn expired_value_is_gone() {
        let (store, clock) = store_with_clock();
        store.set_if_absent("k", "a", Duration::from_secs(2)).await.unwrap();

        clock.advance(Duration::from_secs(2));

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.set_if_absent("k", "b", Duration::from_secs(2)).await.unwrap());
    }

    #[tokio::test]
    async fn compare_and_delete_only_removes_matching_value() {
        let (store, _clock) = store_with_clock();
        store.set_if_absent("k", "mine", Duration::from_secs(5)).await.unwrap();

        assert!(!store.compare_and_delete("k", "theirs").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("mine".to_string()));

        assert!(store.compare_and_delete("k", "mine").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.compare_and_delete("k", "mine").await.unwrap());
    }

    #[tokio::test]
    async fn hash_and_counter_operations() {
        let store = InMemoryStore::new();
        store.hash_set("h", "duration", "12").await.unwrap();
        store.hash_set("h", "success", "true").await.unwrap();
        assert_eq!(store.increment("c").await.unwrap(), 1);
        assert_eq!(store.increment("c").await.unwrap(), 2);

        let hash = store.hash_get_all("h").await.unwrap();
        assert_eq!(hash.get("duration").map(String::as_str), Some("12"));
        assert_eq!(hash.get("success").map(String::as_str), Some("true"));
        assert!(store.hash_get_all("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_type_is_rejected() {
        let store = InMemoryStore::new();
        store.set("k", "text").await.unwrap();
        assert!(matches!(
            store.hash_set("k", "f", "v").await,
            Err(StoreError::Command(_))
        ));
        assert!(matches!(store.increment("k").await, Err(StoreError::Command(_))));
    }
}
