//! Dispatcher - cron トリガーでタスクを起動する
//!
//! # 構成
//! - タスクごとに 1 つのトリガーループ（tokio task）
//! - 実行は `pool_size` 個の permit を持つ Semaphore で上限を設ける
//! - permit が足りないときは待つ（遅延はするが捨てない）
//!
//! # 停止
//! 1. `request_shutdown()` でトリガーループを止める（新しい起動なし）
//! 2. `shutdown(grace)` は全 permit を取り戻すまで待つ（= 実行中の呼び出しが終わる）
//! 3. grace を過ぎたら残りは放棄して warn を出す

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;

use super::registry::RegisteredTask;
use super::wrapper::ExecutionWrapper;
use crate::domain::Execution;
use crate::ports::Clock;

/// Running trigger loops plus the invocation pool.
/// - `request_shutdown()` を呼ぶとトリガー全体が止まる
/// - `shutdown()` で実行中の呼び出しの終了を待てる
pub struct Dispatcher {
    shutdown_tx: watch::Sender<bool>,
    triggers: Vec<JoinHandle<()>>,
    permits: Arc<Semaphore>,
    pool_size: u32,
}

impl Dispatcher {
    /// Spawn one trigger loop per task. Must be called inside a tokio runtime.
    pub fn start(
        tasks: Vec<Arc<RegisteredTask>>,
        wrapper: Arc<ExecutionWrapper>,
        clock: Arc<dyn Clock>,
        tz: Tz,
        pool_size: u32,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let permits = Arc::new(Semaphore::new(pool_size as usize));

        let mut triggers = Vec::with_capacity(tasks.len());
        for task in tasks {
            let trigger = Trigger {
                task,
                wrapper: Arc::clone(&wrapper),
                clock: Arc::clone(&clock),
                tz,
                permits: Arc::clone(&permits),
            };
            let rx = shutdown_rx.clone();
            triggers.push(tokio::spawn(trigger.run(rx)));
        }
        tracing::info!(tasks = triggers.len(), pool_size, %tz, "dispatcher started");

        Self {
            shutdown_tx,
            triggers,
            permits,
            pool_size,
        }
    }

    /// Stop firing new invocations. Running ones are left alone.
    pub fn request_shutdown(&self) {
        // ignore send error: trigger loops may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Invocations currently holding a pool slot.
    pub fn in_flight(&self) -> usize {
        (self.pool_size as usize).saturating_sub(self.permits.available_permits())
    }

    /// Stop the triggers and wait up to `grace` for in-flight invocations.
    ///
    /// Returns `false` if some invocations were still running when `grace` elapsed;
    /// those are abandoned.
    pub async fn shutdown(self, grace: Duration) -> bool {
        self.request_shutdown();
        for trigger in self.triggers {
            let _ = trigger.await;
        }

        match tokio::time::timeout(grace, self.permits.acquire_many(self.pool_size)).await {
            Ok(_) => {
                tracing::info!("dispatcher stopped, all invocations finished");
                true
            }
            Err(_) => {
                let abandoned =
                    (self.pool_size as usize).saturating_sub(self.permits.available_permits());
                tracing::warn!(
                    abandoned,
                    grace_secs = grace.as_secs_f64(),
                    "shutdown grace elapsed, abandoning in-flight invocations"
                );
                false
            }
        }
    }
}

struct Trigger {
    task: Arc<RegisteredTask>,
    wrapper: Arc<ExecutionWrapper>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    permits: Arc<Semaphore>,
}

impl Trigger {
    /// Fire the task at each cron instant until shutdown.
    ///
    /// While waiting for a pool permit no next fire time is computed, so windows that
    /// pass during the wait are skipped, not queued. With a full pool and a task slower
    /// than its interval, the task runs at most once per permit release.
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let name = self.task.definition.name().to_string();
        let mut last_fire: Option<DateTime<Tz>> = None;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            // 同じ時刻を 2 回発火しないよう、前回の発火時刻より前からは探さない
            let now = self.clock.now().with_timezone(&self.tz);
            let after = match last_fire {
                Some(prev) if prev > now => prev,
                _ => now,
            };
            let Some(fire_at) = self.task.schedule.next_after(&after) else {
                tracing::warn!(task = %name, cron = %self.task.schedule, "no future fire time, trigger stopped");
                break;
            };

            let delay = (fire_at.with_timezone(&Utc) - self.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
            last_fire = Some(fire_at);

            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let task = Arc::clone(&self.task);
            let wrapper = Arc::clone(&self.wrapper);
            tokio::spawn(async move {
                let _permit = permit;
                let name = task.definition.name();
                match wrapper.execute(&task.definition).await {
                    Ok(Execution::Skipped(reason)) => {
                        tracing::debug!(task = %name, ?reason, "invocation skipped")
                    }
                    Ok(Execution::Completed { .. }) => {}
                    Err(error) => {
                        tracing::debug!(task = %name, %error, "invocation ended with task error")
                    }
                }
            });
        }

        tracing::debug!(task = %name, "trigger loop exited");
    }
}
