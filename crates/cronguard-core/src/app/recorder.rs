//! ExecutionRecorder - タスク実行結果を共有ストアに記録
//!
//! # 書き込み内容（1 回の実行につき）
//! 1. `task:lastExecutionTime:{name}` ← 現在時刻（ミリ秒）
//! 2. `task:execution:{name}` の `duration` / `success`
//! 3. `task:successCount:{name}` または `task:failureCount:{name}` を INCR
//!
//! 各書き込みは単一のアトミック操作。まとめてはベストエフォートで、途中で失敗したら
//! 残りは書かずにエラーを返す（リトライしない）。

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{ExecutionMetrics, FIELD_DURATION, FIELD_SUCCESS, TaskKeys};
use crate::ports::{Clock, KeyValueStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to record metrics for '{task}': {source}")]
    MetricsWriteFailure {
        task: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to read metrics for '{task}': {source}")]
    MetricsReadFailure {
        task: String,
        #[source]
        source: StoreError,
    },
}

pub struct ExecutionRecorder {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl ExecutionRecorder {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn record(
        &self,
        name: &str,
        duration: Duration,
        success: bool,
    ) -> Result<(), MetricsError> {
        self.write(name, duration, success)
            .await
            .map_err(|source| MetricsError::MetricsWriteFailure {
                task: name.to_string(),
                source,
            })
    }

    async fn write(&self, name: &str, duration: Duration, success: bool) -> Result<(), StoreError> {
        let keys = TaskKeys::for_task(name);
        let now_ms = self.clock.now().timestamp_millis();
        let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);

        self.store
            .set(&keys.last_execution_time, &now_ms.to_string())
            .await?;
        self.store
            .hash_set(&keys.execution, FIELD_DURATION, &duration_ms.to_string())
            .await?;
        self.store
            .hash_set(&keys.execution, FIELD_SUCCESS, &success.to_string())
            .await?;
        let counter = if success {
            &keys.success_count
        } else {
            &keys.failure_count
        };
        self.store.increment(counter).await?;
        Ok(())
    }

    /// Current snapshot; a task that never ran has zero counts and no timestamps.
    pub async fn query(&self, name: &str) -> Result<ExecutionMetrics, MetricsError> {
        self.read(name)
            .await
            .map_err(|source| MetricsError::MetricsReadFailure {
                task: name.to_string(),
                source,
            })
    }

    async fn read(&self, name: &str) -> Result<ExecutionMetrics, StoreError> {
        let keys = TaskKeys::for_task(name);
        let detail = self.store.hash_get_all(&keys.execution).await?;
        let last_execution = self.store.get(&keys.last_execution_time).await?;
        let successes = self.store.get(&keys.success_count).await?;
        let failures = self.store.get(&keys.failure_count).await?;

        Ok(ExecutionMetrics {
            last_execution_time_millis: last_execution.and_then(|v| v.parse().ok()),
            last_duration_millis: detail.get(FIELD_DURATION).and_then(|v| v.parse().ok()),
            last_success: detail.get(FIELD_SUCCESS).and_then(|v| v.parse().ok()),
            success_count: successes.and_then(|v| v.parse().ok()).unwrap_or(0),
            failure_count: failures.and_then(|v| v.parse().ok()).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryStore;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn recorder() -> (ExecutionRecorder, FixedClock) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let store = Arc::new(InMemoryStore::new());
        (ExecutionRecorder::new(store, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn never_run_task_has_empty_metrics() {
        let (recorder, _clock) = recorder();
        let metrics = recorder.query("ghost").await.unwrap();
        assert_eq!(metrics, ExecutionMetrics::default());
        assert_eq!(metrics.total_runs(), 0);
    }

    #[tokio::test]
    async fn success_and_failure_update_their_counters() {
        let (recorder, clock) = recorder();

        recorder.record("C", Duration::from_millis(40), true).await.unwrap();
        clock.advance(Duration::from_secs(2));
        recorder.record("C", Duration::from_millis(15), false).await.unwrap();

        let metrics = recorder.query("C").await.unwrap();
        assert_eq!(metrics.success_count, 1);
        assert_eq!(metrics.failure_count, 1);
        assert_eq!(metrics.last_success, Some(false));
        assert_eq!(metrics.last_duration_millis, Some(15));
        assert_eq!(
            metrics.last_execution_time_millis,
            Some(clock.now().timestamp_millis())
        );
    }

    #[tokio::test]
    async fn metrics_are_kept_per_task() {
        let (recorder, _clock) = recorder();
        recorder.record("a", Duration::ZERO, true).await.unwrap();
        recorder.record("a", Duration::ZERO, true).await.unwrap();
        recorder.record("b", Duration::ZERO, false).await.unwrap();

        assert_eq!(recorder.query("a").await.unwrap().success_count, 2);
        assert_eq!(recorder.query("b").await.unwrap().failure_count, 1);
        assert_eq!(recorder.query("b").await.unwrap().success_count, 0);
    }
}
