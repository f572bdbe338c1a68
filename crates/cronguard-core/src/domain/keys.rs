//! Store key naming.
//!
//! These names are shared by every process talking to the same store, so they are
//! part of the wire contract and must not change.

/// Hash field holding the last run duration in milliseconds.
pub const FIELD_DURATION: &str = "duration";

/// Hash field holding the last run outcome (`true` / `false`).
pub const FIELD_SUCCESS: &str = "success";

/// All store keys that belong to one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskKeys {
    pub lock: String,
    pub execution: String,
    pub last_execution_time: String,
    pub success_count: String,
    pub failure_count: String,
}

impl TaskKeys {
    pub fn for_task(name: &str) -> Self {
        Self {
            lock: format!("task:lock:{name}"),
            execution: format!("task:execution:{name}"),
            last_execution_time: format!("task:lastExecutionTime:{name}"),
            success_count: format!("task:successCount:{name}"),
            failure_count: format!("task:failureCount:{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_shared_naming() {
        let keys = TaskKeys::for_task("nightly-report");
        assert_eq!(keys.lock, "task:lock:nightly-report");
        assert_eq!(keys.execution, "task:execution:nightly-report");
        assert_eq!(keys.last_execution_time, "task:lastExecutionTime:nightly-report");
        assert_eq!(keys.success_count, "task:successCount:nightly-report");
        assert_eq!(keys.failure_count, "task:failureCount:nightly-report");
    }
}
