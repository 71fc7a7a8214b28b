//! Error taxonomy.
//!
//! # 设计背景（Why）
//! A dataflow core has one failure domain worth naming (`CoreError`,
//! surfaced to user code via `EndReason::Other`) plus two narrow, purely
//! structural error enums (`SendError`, `BindError`) for operations that
//! fail synchronously rather than by terminating a stream — no layered
//! implementation/domain/core split is needed here. `thiserror` (see
//! `DESIGN.md` for why it's a normal dependency here) gets us
//! `Display`/`std::error::Error` without hand-rolling them.

use std::borrow::Cow;
use std::sync::Arc;

/// The core failure domain. Carried by `EndReason::Other` when a stream
/// ends abnormally, and returned directly by fallible constructors (e.g.
/// binding a `CustomActivation` policy with an invalid updater).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CoreError {
    message: Cow<'static, str>,
    #[source]
    cause: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CoreError {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        message: impl Into<Cow<'static, str>>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl PartialEq for CoreError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}

/// Returned by `Input::send` when the target cannot accept the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The node has been disconnected from its upstream and will never
    /// accept another message.
    #[error("target has been disconnected")]
    Disconnected,
    /// The node exists but is currently inactive (no live subscriber chain)
    /// and is not a producer that buffers sends while inactive.
    #[error("target is not currently active")]
    Inactive,
}

/// Returned by `Junction::bind`/`Capture::bind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// Binding would create a cycle in the topology.
    #[error("binding would introduce a cycle")]
    Loop,
    /// The junction already has a bound successor.
    #[error("junction is already bound")]
    Duplicate,
    /// The binding's `Lifetime` was cancelled before the bind completed.
    #[error("binding target was cancelled")]
    Cancelled,
}
