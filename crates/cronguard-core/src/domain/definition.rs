//! TaskDefinition - スケジュール対象タスクの定義
//!
//! 起動時に登録され、以後は不変です（TaskRegistry が所有）。

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::errors::TaskError;

/// Lock TTL used when a definition does not set one.
pub const DEFAULT_LOCK_TTL_SECONDS: u64 = 60;

/// The opaque unit of work a scheduled task runs.
///
/// Any `Fn() -> impl Future<Output = Result<(), TaskError>>` closure implements it:
/// ```ignore
/// let def = TaskDefinition::new("cleanup", "0 */5 * * * *", || async {
///     purge_expired_sessions().await.map_err(|e| TaskError::with_source("purge", e))
/// });
/// ```
#[async_trait]
pub trait TaskBody: Send + Sync {
    async fn run(&self) -> Result<(), TaskError>;
}

#[async_trait]
impl<F, Fut> TaskBody for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self) -> Result<(), TaskError> {
        (self)().await
    }
}

/// A named, cron-scheduled task together with its lock policy.
///
/// `name` is used as the suffix of every store key that belongs to the task, so it
/// must be unique across the fleet, not just within one process.
#[derive(Clone)]
pub struct TaskDefinition {
    name: String,
    cron_expression: String,
    lock_ttl_seconds: u64,
    lock_enabled: bool,
    body: Arc<dyn TaskBody>,
}

impl TaskDefinition {
    pub fn new(
        name: impl Into<String>,
        cron_expression: impl Into<String>,
        body: impl TaskBody + 'static,
    ) -> Self {
        Self::from_shared(name, cron_expression, Arc::new(body))
    }

    /// Same as [`TaskDefinition::new`] for a body that is already shared.
    pub fn from_shared(
        name: impl Into<String>,
        cron_expression: impl Into<String>,
        body: Arc<dyn TaskBody>,
    ) -> Self {
        Self {
            name: name.into(),
            cron_expression: cron_expression.into(),
            lock_ttl_seconds: DEFAULT_LOCK_TTL_SECONDS,
            lock_enabled: true,
            body,
        }
    }

    /// Lock expiry. Must exceed the expected runtime of the body.
    pub fn with_lock_ttl(mut self, seconds: u64) -> Self {
        self.lock_ttl_seconds = seconds;
        self
    }

    pub fn with_lock_enabled(mut self, enabled: bool) -> Self {
        self.lock_enabled = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cron_expression(&self) -> &str {
        &self.cron_expression
    }

    pub fn lock_ttl_seconds(&self) -> u64 {
        self.lock_ttl_seconds
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }

    pub fn lock_enabled(&self) -> bool {
        self.lock_enabled
    }

    pub fn body(&self) -> Arc<dyn TaskBody> {
        Arc::clone(&self.body)
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("cron_expression", &self.cron_expression)
            .field("lock_ttl_seconds", &self.lock_ttl_seconds)
            .field("lock_enabled", &self.lock_enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_lock_policy_defaults() {
        let def = TaskDefinition::new("report", "0 0 * * * *", || async {
            Ok::<(), TaskError>(())
        });
        assert_eq!(def.lock_ttl_seconds(), DEFAULT_LOCK_TTL_SECONDS);
        assert!(def.lock_enabled());
        assert_eq!(def.lock_ttl(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn closure_body_runs() {
        let def = TaskDefinition::new("failing", "* * * * * *", || async {
            Err::<(), _>(TaskError::new("boom"))
        })
        .with_lock_ttl(5)
        .with_lock_enabled(false);

        let err = def.body().run().await.unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(def.lock_ttl_seconds(), 5);
        assert!(!def.lock_enabled());
    }
}
