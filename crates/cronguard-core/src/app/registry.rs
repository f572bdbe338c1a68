//! TaskRegistry - スケジュール対象タスクの登録と管理
//!
//! # 設計原則
//! - プロセス起動時に 1 度だけ構築し、以後は読み取り専用
//! - 不正な定義（重複名・不正な cron 式）は登録時に拒否する（発火時ではない）
//! - cron 式は登録時にパース済みの `CronSchedule` として保持

use std::collections::HashMap;
use std::sync::Arc;

use crate::cron::{CronParseError, CronSchedule};
use crate::domain::TaskDefinition;

/// A definition that passed validation, paired with its parsed schedule.
#[derive(Debug)]
pub struct RegisteredTask {
    pub definition: TaskDefinition,
    pub schedule: CronSchedule,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("task '{0}' is already registered")]
    DuplicateTaskName(String),

    #[error("task '{name}' has an invalid cron expression: {source}")]
    InvalidCronExpression {
        name: String,
        #[source]
        source: CronParseError,
    },

    #[error("task name must not be empty")]
    InvalidTaskName,

    #[error("task '{0}' must have a lock TTL of at least one second")]
    InvalidLockTtl(String),
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<RegisteredTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: TaskDefinition) -> Result<(), RegistryError> {
        let name = definition.name().to_string();
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidTaskName);
        }
        if self.tasks.contains_key(&name) {
            return Err(RegistryError::DuplicateTaskName(name));
        }
        if definition.lock_enabled() && definition.lock_ttl_seconds() == 0 {
            return Err(RegistryError::InvalidLockTtl(name));
        }
        let schedule = CronSchedule::parse(definition.cron_expression()).map_err(|source| {
            RegistryError::InvalidCronExpression {
                name: name.clone(),
                source,
            }
        })?;

        tracing::debug!(task = %name, cron = %schedule, "task registered");
        self.tasks.insert(name, Arc::new(RegisteredTask { definition, schedule }));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredTask>> {
        self.tasks.get(name).cloned()
    }

    /// Every registered task, in no particular order.
    pub fn list(&self) -> Vec<Arc<RegisteredTask>> {
        self.tasks.values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
