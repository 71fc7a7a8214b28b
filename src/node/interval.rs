//! `Interval` and `Timer`: timed leaf producers built on [`crate::exec`]'s
//! delayed/periodic submission rather than a free-running thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::gate::Gate;
use super::{Activatable, Next};
use crate::exec::ExecContext;
use crate::item::EndReason;
use crate::time::TimerHandle;
use tracing::debug;

/// Emits a strictly increasing tick count every `period` while active.
/// Paused (not merely ignored) on deactivation: the underlying timer is
/// cancelled rather than left running and discarded by an activation-count
/// mismatch, so an `Interval` behind a context with no other work truly
/// goes idle.
pub struct Interval {
    gate: Gate<u64>,
    next: Next<u64>,
    exec: Arc<dyn ExecContext>,
    period: Duration,
    tick: AtomicU64,
    handle: Mutex<Option<TimerHandle>>,
    self_weak: Weak<Interval>,
}

impl Interval {
    pub fn new(exec: Arc<dyn ExecContext>, period: Duration, next: Next<u64>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            gate: Gate::new(exec.clone()),
            next,
            exec,
            period,
            tick: AtomicU64::new(0),
            handle: Mutex::new(None),
            self_weak: weak.clone(),
        })
    }
}

impl Activatable for Interval {
    fn activate(&self) {
        let Some(count) = self.gate.attach() else {
            return;
        };
        self.tick.store(0, Ordering::SeqCst);
        debug!(period_ms = self.period.as_millis() as u64, "interval activating");
        let this = self
            .self_weak
            .upgrade()
            .expect("Interval outlives any activate() call through its own Arc");
        let handle = self.exec.submit_periodic(
            self.period,
            Arc::new(move || {
                if this.gate.activation() != count {
                    return;
                }
                let tick = this.tick.fetch_add(1, Ordering::SeqCst);
                this.next.send_value(tick);
            }),
        );
        *self.handle.lock() = Some(handle);
    }

    fn deactivate(&self) {
        if self.gate.detach() {
            if let Some(handle) = self.handle.lock().take() {
                handle.cancel();
            }
            debug!("interval deactivating");
        }
    }
}

/// Fires exactly once after `delay`, then emits `End(Complete)`. Building
/// block the `retry`/timeout operators are implemented on top of rather
/// than treating timeouts as a primitive.
pub struct Timer {
    gate: Gate<()>,
    next: Next<()>,
    exec: Arc<dyn ExecContext>,
    delay: Duration,
    handle: Mutex<Option<TimerHandle>>,
    self_weak: Weak<Timer>,
}

impl Timer {
    pub fn new(exec: Arc<dyn ExecContext>, delay: Duration, next: Next<()>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            gate: Gate::new(exec.clone()),
            next,
            exec,
            delay,
            handle: Mutex::new(None),
            self_weak: weak.clone(),
        })
    }
}

impl Activatable for Timer {
    fn activate(&self) {
        let Some(count) = self.gate.attach() else {
            return;
        };
        debug!(delay_ms = self.delay.as_millis() as u64, "timer activating");
        let this = self
            .self_weak
            .upgrade()
            .expect("Timer outlives any activate() call through its own Arc");
        let handle = self.exec.submit_after(
            self.delay,
            Box::new(move || {
                if this.gate.activation() != count {
                    return;
                }
                this.next.send_value(());
                this.next.send_end(EndReason::Complete);
            }),
        );
        *self.handle.lock() = Some(handle);
    }

    fn deactivate(&self) {
        if self.gate.detach() {
            if let Some(handle) = self.handle.lock().take() {
                handle.cancel();
            }
        }
    }
}
