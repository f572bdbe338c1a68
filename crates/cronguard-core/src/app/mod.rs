//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **DistributedLock**: fencing token 付きの共有ロック
//! - **ExecutionRecorder**: 実行メトリクスの記録と照会
//! - **StatusQuery**: タスク状態のマップ表現（読み取り専用）
//! - **TaskRegistry**: タスク定義の登録と検証
//! - **ExecutionWrapper**: lock → run → record → release
//! - **Dispatcher**: cron トリガーと実行プール
//! - **SchedulerBuilder / Scheduler**: ワイヤリングとコンテキスト

pub mod builder;
pub mod dispatcher;
pub mod lock;
pub mod recorder;
pub mod registry;
pub mod status;
pub mod wrapper;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, Scheduler, SchedulerBuilder};
pub use self::dispatcher::Dispatcher;
pub use self::lock::{DistributedLock, LockError, LockToken};
pub use self::recorder::{ExecutionRecorder, MetricsError};
pub use self::registry::{RegisteredTask, RegistryError, TaskRegistry};
pub use self::status::{StatusQuery, TaskStatus};
pub use self::wrapper::ExecutionWrapper;
