//! Ports - 抽象化レイヤー
//!
//! 外部システム（共有 KV ストア、時刻、乱数）へのインターフェースを定義し、
//! 実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - 共有ストア（Redis）がロックとメトリクスの正本
//! - ローカルプロセスはストアの状態をキャッシュしない

pub mod clock;
pub mod store;
pub mod token;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::store::{KeyValueStore, StoreError};
pub use self::token::{TokenGenerator, UlidTokenGenerator};
