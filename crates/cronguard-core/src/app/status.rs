//! Status - タスク状態の照会（HTTP 層などから読み取り専用で使う）
//!
//! # 返すマップ
//! - `task:execution:{name}` の全フィールド（`duration`, `success`）
//! - `lastExecutionTime`（未実行なら null）
//! - `successCount` / `failureCount`（未実行なら 0）

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::recorder::MetricsError;
use crate::domain::TaskKeys;
use crate::ports::{KeyValueStore, StoreError};

pub type TaskStatus = BTreeMap<String, Value>;

pub struct StatusQuery {
    store: Arc<dyn KeyValueStore>,
}

impl StatusQuery {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn task_status(&self, name: &str) -> Result<TaskStatus, MetricsError> {
        self.read(name)
            .await
            .map_err(|source| MetricsError::MetricsReadFailure {
                task: name.to_string(),
                source,
            })
    }

    async fn read(&self, name: &str) -> Result<TaskStatus, StoreError> {
        let keys = TaskKeys::for_task(name);
        let mut status: TaskStatus = self
            .store
            .hash_get_all(&keys.execution)
            .await?
            .into_iter()
            .map(|(field, raw)| (field, scalar(&raw)))
            .collect();

        let last = self.store.get(&keys.last_execution_time).await?;
        status.insert(
            "lastExecutionTime".to_string(),
            last.as_deref().map(scalar).unwrap_or(Value::Null),
        );

        let successes = self.store.get(&keys.success_count).await?;
        let failures = self.store.get(&keys.failure_count).await?;
        status.insert("successCount".to_string(), counter(successes.as_deref()));
        status.insert("failureCount".to_string(), counter(failures.as_deref()));
        Ok(status)
    }
}

/// Numbers and booleans come back typed; anything else stays a string.
fn scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

fn counter(raw: Option<&str>) -> Value {
    raw.map(scalar).unwrap_or_else(|| Value::from(0))
}
