//! The `ExecContext` capability abstraction: submit, submit-after-delay,
//! periodic-timer, and the structural "serialize" guarantee a node's gate
//! relies on.

mod inline;
mod thread;

pub use inline::InlineExec;
pub use thread::ThreadExec;

use std::sync::Arc;
use std::time::Duration;

use crate::time::{Clock, TimerHandle};

/// An abstract execution capability a node is bound to.
///
/// # 设计背景（Why）
/// Decouples node/task scheduling from a concrete async runtime, built
/// around plain callbacks rather than `Future`s, because this crate's
/// handlers run to completion synchronously and never await anything.
///
/// # 契约说明（What）
/// Implementations must guarantee **serialize**: for any one node bound to
/// this context, at most one submitted job for that node is executing at a
/// time. This is not a separate method — it falls out of how a node's
/// [`crate::node::gate::Gate`] only ever has one job in flight on its
/// context (see `Gate::admit`); an `ExecContext` only needs to honor FIFO
/// or at-least-serialized execution of whatever it is handed, not implement
/// the serialization itself.
pub trait ExecContext: Send + Sync + 'static {
    /// Runs `job` on this context. May run inline on the calling thread
    /// (`InlineExec`) or hand off to a worker thread (`ThreadExec`).
    fn submit(&self, job: Box<dyn FnOnce() + Send>);

    /// Runs `job` once after `delay`.
    fn submit_after(&self, delay: Duration, job: Box<dyn FnOnce() + Send>) -> TimerHandle;

    /// Runs `job` every `period` until the handle is cancelled.
    fn submit_periodic(&self, period: Duration, job: Arc<dyn Fn() + Send + Sync>) -> TimerHandle;

    /// The clock backing this context's timers, exposed so producers like
    /// `Interval`/`Timer` can read `now()` without assuming a particular
    /// implementation.
    fn clock(&self) -> &dyn Clock;
}
