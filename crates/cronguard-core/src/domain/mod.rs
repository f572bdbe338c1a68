//! Domain model (task definitions, execution results, metrics, key naming).

pub mod definition;
pub mod errors;
pub mod execution;
pub mod keys;
pub mod metrics;

pub use self::definition::{DEFAULT_LOCK_TTL_SECONDS, TaskBody, TaskDefinition};
pub use self::errors::{FailureKind, TaskError};
pub use self::execution::{Execution, LockMode, SkipReason};
pub use self::keys::{FIELD_DURATION, FIELD_SUCCESS, TaskKeys};
pub use self::metrics::ExecutionMetrics;
