//! SchedulerBuilder - スケジューラの構築とワイヤリング
//!
//! # 設計原則
//! - 起動時検証（Fail-fast 設計）: 不正なタスク定義は register() で、
//!   期待タスクの不足や不正な設定は build() で拒否する
//! - グローバルな状態は持たない。`Scheduler` が registry / lock / recorder を束ねる
//!   コンテキストオブジェクトとして明示的に渡される

use std::sync::Arc;

use chrono_tz::Tz;

use super::dispatcher::Dispatcher;
use super::lock::DistributedLock;
use super::recorder::ExecutionRecorder;
use super::registry::{RegistryError, TaskRegistry};
use super::status::StatusQuery;
use super::wrapper::ExecutionWrapper;
use crate::config::{ConfigError, SchedulerConfig};
use crate::domain::TaskDefinition;
use crate::ports::{Clock, KeyValueStore, SystemClock, TokenGenerator, UlidTokenGenerator};

/// SchedulerBuilder はスケジューラを構築
///
/// # 使用例
/// ```ignore
/// let scheduler = SchedulerBuilder::new(store)
///     .config(config)
///     .register(TaskDefinition::new("cleanup", "0 */5 * * * *", cleanup))?
///     .expect_tasks(&["cleanup"])
///     .build()?;
/// let dispatcher = scheduler.start();
/// ```
pub struct SchedulerBuilder {
    store: Arc<dyn KeyValueStore>,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    tokens: Option<Arc<dyn TokenGenerator>>,
    registry: TaskRegistry,
    expected_tasks: Option<Vec<String>>,
}

/// BuildError はスケジューラ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing tasks: {0:?}. These tasks were expected but not registered.")]
    MissingTasks(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SchedulerBuilder {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            config: SchedulerConfig::default(),
            clock: Arc::new(SystemClock),
            tokens: None,
            registry: TaskRegistry::new(),
            expected_tasks: None,
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the fencing token source (ULID by default).
    pub fn token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn register(mut self, definition: TaskDefinition) -> Result<Self, RegistryError> {
        self.registry.register(definition)?;
        Ok(self)
    }

    /// Task names that must be registered for `build()` to succeed.
    pub fn expect_tasks(mut self, names: &[&str]) -> Self {
        self.expected_tasks = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Scheduler, BuildError> {
        if let Some(expected) = &self.expected_tasks {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| self.registry.get(name).is_none())
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTasks(missing));
            }
        }
        self.config.validate()?;
        let time_zone = self.config.time_zone()?;

        let tokens: Arc<dyn TokenGenerator> = match self.tokens {
            Some(tokens) => tokens,
            None => Arc::new(UlidTokenGenerator::new(Arc::clone(&self.clock))),
        };
        let lock = Arc::new(DistributedLock::new(Arc::clone(&self.store), tokens));
        let recorder = Arc::new(ExecutionRecorder::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
        ));
        let wrapper = Arc::new(ExecutionWrapper::new(
            Arc::clone(&lock),
            Arc::clone(&recorder),
            self.config.lock_failure_policy,
        ));

        Ok(Scheduler {
            registry: Arc::new(self.registry),
            lock,
            recorder,
            status: Arc::new(StatusQuery::new(self.store)),
            wrapper,
            clock: self.clock,
            time_zone,
            config: self.config,
        })
    }
}

/// Scheduler はプロセスに 1 つのコンテキストオブジェクト
///
/// registry は構築後は不変。`start()` でトリガーを起動し、返された
/// `Dispatcher` で停止する。
pub struct Scheduler {
    registry: Arc<TaskRegistry>,
    lock: Arc<DistributedLock>,
    recorder: Arc<ExecutionRecorder>,
    status: Arc<StatusQuery>,
    wrapper: Arc<ExecutionWrapper>,
    clock: Arc<dyn Clock>,
    time_zone: Tz,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn lock(&self) -> &DistributedLock {
        &self.lock
    }

    pub fn recorder(&self) -> &ExecutionRecorder {
        &self.recorder
    }

    pub fn status(&self) -> &StatusQuery {
        &self.status
    }

    pub fn wrapper(&self) -> &ExecutionWrapper {
        &self.wrapper
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Begin firing every registered task. Must be called inside a tokio runtime.
    pub fn start(&self) -> Dispatcher {
        Dispatcher::start(
            self.registry.list(),
            Arc::clone(&self.wrapper),
            Arc::clone(&self.clock),
            self.time_zone,
            self.config.pool_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockFailurePolicy;
    use crate::domain::{Execution, TaskError};
    use crate::impls::InMemoryStore;

    fn noop(name: &str) -> TaskDefinition {
        TaskDefinition::new(name, "0 0 * * * *", || async { Ok::<(), TaskError>(()) })
    }

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(InMemoryStore::new())
    }

    #[test]
    fn build_success() {
        let scheduler = SchedulerBuilder::new(store())
            .register(noop("report"))
            .unwrap()
            .expect_tasks(&["report"])
            .build()
            .unwrap();
        assert_eq!(scheduler.registry().len(), 1);
        assert_eq!(scheduler.wrapper().policy(), LockFailurePolicy::FailOpen);
    }

    #[test]
    fn build_missing_tasks() {
        let result = SchedulerBuilder::new(store())
            .register(noop("report"))
            .unwrap()
            .expect_tasks(&["report", "cleanup"])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingTasks(missing)) if missing == vec!["cleanup".to_string()]
        ));
    }

    #[test]
    fn duplicate_registration_fails_fast() {
        let result = SchedulerBuilder::new(store())
            .register(noop("report"))
            .unwrap()
            .register(noop("report"));
        assert!(matches!(result, Err(RegistryError::DuplicateTaskName(_))));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SchedulerConfig {
            timezone: "Nowhere/Special".to_string(),
            ..SchedulerConfig::default()
        };
        let result = SchedulerBuilder::new(store()).config(config).build();
        assert!(matches!(result, Err(BuildError::Config(_))));
    }

    #[tokio::test]
    async fn context_wires_wrapper_and_status_to_one_store() {
        let scheduler = SchedulerBuilder::new(store())
            .register(noop("report"))
            .unwrap()
            .build()
            .unwrap();

        let registered = scheduler.registry().get("report").unwrap();
        let outcome = scheduler.wrapper().execute(&registered.definition).await.unwrap();
        assert!(matches!(outcome, Execution::Completed { .. }));

        let status = scheduler.status().task_status("report").await.unwrap();
        assert_eq!(status.get("successCount"), Some(&serde_json::json!(1)));
        assert_eq!(scheduler.recorder().query("report").await.unwrap().success_count, 1);
    }
}
