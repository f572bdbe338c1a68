//! Errors - タスク本体のエラー
//!
//! TaskError はタスク本体（TaskBody）が返す、または panic から変換されるエラーです。
//! ロックストアやメトリクスのエラーはそれぞれの所有者（app::lock, app::recorder）で定義します。

use std::error::Error;

/// FailureKind はタスク失敗の分類
///
/// - Returned: 本体が `Err` を返した
/// - Panicked: 本体が panic した（ワーカーは生き残る）
/// - Aborted: 本体の tokio task が外部から中断された
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Returned,
    Panicked,
    Aborted,
}

/// TaskError はタスク本体のエラー
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    kind: FailureKind,
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Returned,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it reachable through `source()`.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind: FailureKind::Returned,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub(crate) fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Panicked,
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn aborted(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Aborted,
            message: message.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = TaskError::with_source("report export failed", io);

        assert_eq!(err.kind(), FailureKind::Returned);
        assert_eq!(err.to_string(), "report export failed");
        assert_eq!(err.source().map(|s| s.to_string()), Some("disk full".to_string()));
    }

    #[test]
    fn panicked_errors_are_classified() {
        let err = TaskError::panicked("index out of bounds");
        assert_eq!(err.kind(), FailureKind::Panicked);
        assert!(err.source().is_none());
    }
}
