//! ExecutionMetrics - タスクごとの実行統計のスナップショット

use serde::{Deserialize, Serialize};

/// Snapshot of what the fleet has recorded for one task.
///
/// Counters only ever grow; the `last_*` fields describe the most recent attempt
/// from any process and are `None` until the task has run once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetrics {
    pub last_execution_time_millis: Option<i64>,
    pub last_duration_millis: Option<i64>,
    pub last_success: Option<bool>,
    pub success_count: i64,
    pub failure_count: i64,
}

impl ExecutionMetrics {
    pub fn total_runs(&self) -> i64 {
        self.success_count + self.failure_count
    }
}
