//! `retry`: rebuilds a failed source up to a fixed number of times, waiting
//! a fixed delay between attempts.
//!
//! Simplified to a single fixed delay rather than a jittered adaptive
//! backoff — this crate's retry is a graph-wiring primitive, not a
//! congestion controller, and only a fixed wait needs exercising. Built on
//! `ExecContext::submit_after` directly rather than a standalone `Timer`
//! node, since timeouts are themselves only an operator built on `Timer` +
//! `Combine`, not a primitive worth depending on here.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::exec::ExecContext;
use crate::item::{EndReason, Item};
use crate::node::{Activatable, GatedSink, Next, Port};
use crate::time::TimerHandle;
use tracing::{error, warn};

struct RetryState {
    attempts_used: usize,
    upstream: Option<Arc<dyn Activatable>>,
    timer: Option<TimerHandle>,
    active: bool,
}

/// Wraps a repeatable source factory, resubscribing on `End(Other(_))` up
/// to `max_attempts` times with `delay` between attempts. A `Complete` or
/// `Cancelled` End, or an error after attempts are exhausted, propagates
/// downstream untouched.
pub struct Retry<T: Send + 'static> {
    next: Next<T>,
    exec: Arc<dyn ExecContext>,
    make_source: Box<dyn Fn(Arc<dyn GatedSink<T>>) -> Arc<dyn Activatable> + Send + Sync>,
    max_attempts: usize,
    delay: Duration,
    state: Mutex<RetryState>,
    self_weak: Weak<Retry<T>>,
}

impl<T> Retry<T>
where
    T: Send + 'static,
{
    pub fn new(
        exec: Arc<dyn ExecContext>,
        next: Next<T>,
        max_attempts: usize,
        delay: Duration,
        make_source: impl Fn(Arc<dyn GatedSink<T>>) -> Arc<dyn Activatable> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            next,
            exec,
            make_source: Box::new(make_source),
            max_attempts,
            delay,
            state: Mutex::new(RetryState {
                attempts_used: 0,
                upstream: None,
                timer: None,
                active: false,
            }),
            self_weak: weak.clone(),
        })
    }

    /// Builds a fresh source and activates it. Each attempt gets its own
    /// `Port`, so a late delivery from a previous (already-dropped) attempt
    /// has nowhere left to land.
    fn spawn_attempt(self: &Arc<Self>) {
        let handler = self.clone();
        let active_check = self.clone();
        let port: Arc<dyn GatedSink<T>> = Arc::new(Port::new(
            move |item| handler.on_item(item),
            move || active_check.state.lock().active,
        ));
        let upstream = (self.make_source)(port);
        {
            let mut state = self.state.lock();
            state.upstream = Some(upstream.clone());
        }
        upstream.activate();
    }

    fn on_item(self: &Arc<Self>, item: Item<T>) {
        match item {
            Item::Value(value) => self.next.send_value(value),
            Item::End(EndReason::Other(err)) => {
                let mut state = self.state.lock();
                if state.active && state.attempts_used < self.max_attempts {
                    state.attempts_used += 1;
                    warn!(%err, attempt = state.attempts_used, max = self.max_attempts, "retrying after a failed attempt");
                    let this = self.clone();
                    let handle = self.exec.submit_after(
                        self.delay,
                        Box::new(move || {
                            if this.state.lock().active {
                                this.spawn_attempt();
                            }
                        }),
                    );
                    state.timer = Some(handle);
                } else {
                    drop(state);
                    error!(%err, "retry attempts exhausted, surfacing the error");
                    self.next.send_end(EndReason::Other(err));
                }
            }
            Item::End(reason) => self.next.send_end(reason),
        }
    }
}

impl<T> Activatable for Retry<T>
where
    T: Send + 'static,
{
    fn activate(&self) {
        let mut state = self.state.lock();
        if state.active {
            return;
        }
        state.active = true;
        state.attempts_used = 0;
        drop(state);
        let this = self
            .self_weak
            .upgrade()
            .expect("Retry outlives any activate() call through its own Arc");
        this.spawn_attempt();
    }

    fn deactivate(&self) {
        let mut state = self.state.lock();
        if !state.active {
            return;
        }
        state.active = false;
        let upstream = state.upstream.take();
        let timer = state.timer.take();
        drop(state);
        if let Some(timer) = timer {
            timer.cancel();
        }
        if let Some(upstream) = upstream {
            upstream.deactivate();
        }
    }
}
