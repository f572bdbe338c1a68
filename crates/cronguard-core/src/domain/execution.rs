//! Execution - 1 回のトリガー発火の結果
//!
//! # 状態遷移
//! - IDLE → LOCK_PENDING → RUNNING → RECORDING → RELEASING → DONE
//! - IDLE → LOCK_PENDING → LOCK_DENIED → DONE（メトリクス記録なし）
//! - IDLE → RUNNING（lock 無効: LOCK_BYPASSED）
//!
//! 失敗（TaskError）は Execution ではなく `Err` として呼び出し元に返ります。

use std::time::Duration;

/// How the run was guarded while the body executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// The fleet-wide lock was held for the whole run.
    Held,
    /// The task has locking disabled.
    Bypassed,
    /// The lock store was unreachable and the run proceeded without a lock.
    Degraded,
}

/// Why a trigger did not run the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another process holds the lock for this window.
    LockHeld,
    /// The lock store was unreachable and the policy is fail-closed.
    LockStoreUnavailable,
}

/// Result of one invocation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Completed { duration: Duration, lock: LockMode },
    Skipped(SkipReason),
}

impl Execution {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Execution::Skipped(_))
    }
}
