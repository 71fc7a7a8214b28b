use std::sync::Arc;
use std::time::Duration;

use super::ExecContext;
use crate::time::{Clock, SystemClock, TimerHandle};

/// Runs every submitted job synchronously on the calling thread.
///
/// # 设计背景（Why）
/// Useful for tests and for cheap intra-process wiring where hopping
/// threads buys nothing — a `Transform` feeding straight into a
/// `Subscriber` with no parallelism requirement, for instance. Because
/// `submit` never returns before `job` has run, a node bound to
/// `InlineExec` processes its entire activation burst and any reentrant
/// sends on the caller's own stack.
pub struct InlineExec {
    clock: Arc<dyn Clock>,
}

impl InlineExec {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for InlineExec {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecContext for InlineExec {
    fn submit(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }

    fn submit_after(&self, delay: Duration, job: Box<dyn FnOnce() + Send>) -> TimerHandle {
        self.clock.spawn_after(delay, job)
    }

    fn submit_periodic(&self, period: Duration, job: Arc<dyn Fn() + Send + Sync>) -> TimerHandle {
        self.clock.spawn_periodic(period, job)
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}
