//! ExecutionWrapper - 1 回のトリガー発火を実行する
//!
//! # 状態遷移
//! ```text
//! LOCK_PENDING ──denied──────────────────────────────▶ DONE (Skipped, メトリクスなし)
//!      │ acquired / bypassed / store unavailable (fail-open)
//!      ▼
//!   RUNNING ──▶ RECORDING ──▶ RELEASING ──▶ DONE (Completed | Err(TaskError))
//! ```
//!
//! # 設計原則
//! - 順序は必ず lock → run → record → release
//! - メトリクス書き込み失敗・ロック解放失敗はログに出して握りつぶす
//! - 本体のエラーは release を試みた後にだけ呼び出し元へ返す
//! - 本体の panic は別 tokio task で捕捉し、TaskError として扱う
//! - ロック取得後の run → record → release は 1 つの tokio task で完結する
//!   （呼び出し側が future を drop しても本体より先にロックを手放さない）

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use super::lock::{DistributedLock, LockToken};
use super::recorder::ExecutionRecorder;
use crate::config::LockFailurePolicy;
use crate::domain::{Execution, LockMode, SkipReason, TaskBody, TaskDefinition, TaskError};

pub struct ExecutionWrapper {
    lock: Arc<DistributedLock>,
    recorder: Arc<ExecutionRecorder>,
    policy: LockFailurePolicy,
}

impl ExecutionWrapper {
    pub fn new(
        lock: Arc<DistributedLock>,
        recorder: Arc<ExecutionRecorder>,
        policy: LockFailurePolicy,
    ) -> Self {
        Self {
            lock,
            recorder,
            policy,
        }
    }

    pub fn policy(&self) -> LockFailurePolicy {
        self.policy
    }

    /// Run `task` once under the fleet-wide lock.
    ///
    /// `Err` carries the body's own failure and is returned only after metrics were
    /// written and the lock release was attempted.
    ///
    /// Once the lock is taken, run → record → release proceeds on its own task. Dropping
    /// the returned future detaches from it but never releases the lock early.
    pub async fn execute(&self, task: &TaskDefinition) -> Result<Execution, TaskError> {
        let name = task.name();

        let (token, mode) = if task.lock_enabled() {
            match self.lock.acquire(name, task.lock_ttl()).await {
                Ok(Some(token)) => {
                    tracing::info!(task = %name, ttl_secs = task.lock_ttl_seconds(), "lock acquired");
                    (Some(token), LockMode::Held)
                }
                Ok(None) => {
                    tracing::debug!(task = %name, "lock held elsewhere, skipping");
                    return Ok(Execution::Skipped(SkipReason::LockHeld));
                }
                Err(error) => match self.policy {
                    LockFailurePolicy::FailOpen => {
                        tracing::warn!(task = %name, %error, "lock store unavailable, running without lock");
                        (None, LockMode::Degraded)
                    }
                    LockFailurePolicy::FailClosed => {
                        tracing::warn!(task = %name, %error, "lock store unavailable, skipping");
                        return Ok(Execution::Skipped(SkipReason::LockStoreUnavailable));
                    }
                },
            }
        } else {
            (None, LockMode::Bypassed)
        };

        let invocation = Invocation {
            name: name.to_string(),
            body: task.body(),
            mode,
            token,
            lock: Arc::clone(&self.lock),
            recorder: Arc::clone(&self.recorder),
        };
        match tokio::spawn(invocation.run()).await {
            Ok(result) => result,
            Err(join) if join.is_panic() => Err(TaskError::panicked(panic_message(join.into_panic()))),
            Err(join) => Err(TaskError::aborted(join.to_string())),
        }
    }
}

/// Everything after LOCK_PENDING for one trigger.
struct Invocation {
    name: String,
    body: Arc<dyn TaskBody>,
    mode: LockMode,
    token: Option<LockToken>,
    lock: Arc<DistributedLock>,
    recorder: Arc<ExecutionRecorder>,
}

impl Invocation {
    async fn run(self) -> Result<Execution, TaskError> {
        let name = self.name.as_str();

        tracing::info!(task = %name, lock = ?self.mode, "task started");
        let started = Instant::now();
        let result = run_body(self.body).await;
        let duration = started.elapsed();

        match &result {
            Ok(()) => {
                tracing::info!(task = %name, duration_ms = duration.as_millis() as u64, "task finished")
            }
            Err(error) => tracing::error!(
                task = %name,
                kind = ?error.kind(),
                %error,
                duration_ms = duration.as_millis() as u64,
                "task failed"
            ),
        }

        if let Err(error) = self.recorder.record(name, duration, result.is_ok()).await {
            tracing::warn!(task = %name, %error, "failed to record execution metrics");
        }

        if let Some(token) = &self.token {
            match self.lock.release(name, token).await {
                Ok(true) => tracing::debug!(task = %name, "lock released"),
                Ok(false) => tracing::warn!(
                    task = %name,
                    "lock was no longer ours at release (expired before the task finished)"
                ),
                Err(error) => tracing::warn!(task = %name, %error, "failed to release lock"),
            }
        }

        result.map(|()| Execution::Completed {
            duration,
            lock: self.mode,
        })
    }
}

/// Runs the body on its own task so a panic becomes a `TaskError`.
async fn run_body(body: Arc<dyn TaskBody>) -> Result<(), TaskError> {
    match tokio::spawn(async move { body.run().await }).await {
        Ok(result) => result,
        Err(join) if join.is_panic() => Err(TaskError::panicked(panic_message(join.into_panic()))),
        Err(join) => Err(TaskError::aborted(join.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("task panicked: {detail}"),
        None => "task panicked".to_string(),
    }
}
