//! cronguard-core
//!
//! Cron-driven task execution for a fleet of cooperating processes. Every process
//! evaluates the same schedule; a shared key-value store decides which one runs
//! each trigger window.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskDefinition, TaskError, ExecutionMetrics, key naming）
//! - **ports**: 抽象化レイヤー（KeyValueStore, Clock, TokenGenerator）
//! - **impls**: ports の実装（InMemoryStore, RedisStore）
//! - **cron**: cron 式のパースと次回発火時刻の計算
//! - **app**: アプリケーションロジック（lock, recorder, registry, wrapper, dispatcher, builder）
//! - **config**: SchedulerConfig（TOML）

pub mod app;
pub mod config;
pub mod cron;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{
    DistributedLock, Dispatcher, ExecutionRecorder, ExecutionWrapper, Scheduler,
    SchedulerBuilder, StatusQuery, TaskRegistry,
};
pub use config::{LockFailurePolicy, SchedulerConfig};
pub use domain::{Execution, ExecutionMetrics, TaskDefinition, TaskError};
