//! `Subscriber` (terminal sink) and the `Lifetime` cancellation handle every
//! subscribe/junction/capture/bind operation returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::gate::{Admit, Gate};
use super::{Activatable, GatedSink, Sink};
use crate::activation::ActivationCount;
use crate::exec::ExecContext;
use crate::item::{EndReason, Item};
use tracing::{debug, error};

/// An opaque cancellation handle. Dropping it does **not** cancel the
/// subscription — only an explicit `cancel()` does: ownership of the
/// subtree is explicit, not tied to this handle's lifetime.
#[derive(Clone)]
pub struct Lifetime {
    inner: Arc<LifetimeInner>,
}

struct LifetimeInner {
    cancelled: AtomicBool,
    cancel: Box<dyn Fn() + Send + Sync>,
}

impl Lifetime {
    fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(LifetimeInner {
                cancelled: AtomicBool::new(false),
                cancel: Box::new(cancel),
            }),
        }
    }

    /// Idempotent and non-blocking. A second call is a no-op.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            debug!("lifetime cancelled");
            (self.inner.cancel)();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }
}

/// Delivers to a user callback and holds the graph alive against activation
/// rules for as long as its `Lifetime` is live and uncancelled.
pub struct Subscriber<T: Send + 'static> {
    gate: Gate<T>,
    handler: Mutex<Box<dyn FnMut(Item<T>) + Send>>,
    upstream: Mutex<Option<Arc<dyn Activatable>>>,
    ended: AtomicBool,
    self_weak: Weak<Subscriber<T>>,
}

impl<T> Subscriber<T>
where
    T: Send + 'static,
{
    fn empty(exec: Arc<dyn ExecContext>, handler: impl FnMut(Item<T>) + Send + 'static) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            gate: Gate::new(exec),
            handler: Mutex::new(Box::new(handler)),
            upstream: Mutex::new(None),
            ended: AtomicBool::new(false),
            self_weak: weak.clone(),
        })
    }

    fn activate_now(self: &Arc<Self>) {
        if self.gate.attach().is_some() {
            if let Some(upstream) = self.upstream.lock().clone() {
                upstream.activate();
            }
        }
    }

    fn detach_from_upstream(self: &Arc<Self>) {
        if self.gate.detach() {
            if let Some(upstream) = self.upstream.lock().clone() {
                upstream.deactivate();
            }
        }
    }

    fn cancel(self: &Arc<Self>) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            (self.handler.lock())(Item::End(EndReason::Cancelled));
        }
        self.detach_from_upstream();
    }

    fn run_burst(self: Arc<Self>, first: Item<T>) {
        let mut current = first;
        loop {
            let is_end = current.is_end();
            if let Item::End(EndReason::Other(err)) = &current {
                error!(%err, "subscriber observed an error end");
            }
            (self.handler.lock())(current);
            if is_end {
                self.ended.store(true, Ordering::SeqCst);
                self.detach_from_upstream();
                return;
            }
            match self.gate.next() {
                Some(item) => current = item,
                None => break,
            }
        }
    }
}

impl<T> Sink<T> for Subscriber<T>
where
    T: Send + 'static,
{
    fn deliver(&self, item: Item<T>, count: ActivationCount) {
        match self.gate.admit(item, count) {
            Admit::Discarded | Admit::Queued => {}
            Admit::Run(first) => {
                let this = self
                    .self_weak
                    .upgrade()
                    .expect("Subscriber outlives any delivery through its own Arc");
                self.gate.exec().submit(Box::new(move || this.run_burst(first)));
            }
        }
    }
}

impl<T> GatedSink<T> for Subscriber<T>
where
    T: Send + 'static,
{
    fn activation(&self) -> ActivationCount {
        self.gate.activation()
    }

    fn is_active(&self) -> bool {
        self.gate.is_active()
    }
}

/// Subscribes `handler` to whatever `make_upstream` wires up, running the
/// activation burst synchronously so values emitted during subscription are
/// observed before this call returns.
pub fn subscribe<T>(
    exec: Arc<dyn ExecContext>,
    make_upstream: impl FnOnce(Arc<dyn GatedSink<T>>) -> Arc<dyn Activatable>,
    handler: impl FnMut(Item<T>) + Send + 'static,
) -> Lifetime
where
    T: Send + 'static,
{
    let subscriber = Subscriber::empty(exec, handler);
    let upstream = make_upstream(subscriber.clone());
    *subscriber.upstream.lock() = Some(upstream);
    subscriber.activate_now();
    let cancel_target = subscriber.clone();
    Lifetime::new(move || cancel_target.cancel())
}

/// Convenience wrapper over [`subscribe`] that only observes `Value`s.
pub fn subscribe_values<T>(
    exec: Arc<dyn ExecContext>,
    make_upstream: impl FnOnce(Arc<dyn GatedSink<T>>) -> Arc<dyn Activatable>,
    mut on_value: impl FnMut(T) + Send + 'static,
) -> Lifetime
where
    T: Send + 'static,
{
    subscribe(exec, make_upstream, move |item| {
        if let Item::Value(value) = item {
            on_value(value);
        }
    })
}

/// Convenience wrapper over [`subscribe`] that self-cancels the first time
/// `predicate` returns `false` for an observed item.
///
/// # 风险提示（Trade-offs）
/// A `false` verdict returned *during* the synchronous activation burst
/// inside `subscribe` cannot cancel mid-burst — the `Lifetime` does not
/// exist yet at that point. It cancels as soon as the burst returns.
pub fn subscribe_while<T>(
    exec: Arc<dyn ExecContext>,
    make_upstream: impl FnOnce(Arc<dyn GatedSink<T>>) -> Arc<dyn Activatable>,
    mut predicate: impl FnMut(&Item<T>) -> bool + Send + 'static,
) -> Lifetime
where
    T: Send + 'static,
{
    let cell: Arc<Mutex<Option<Lifetime>>> = Arc::new(Mutex::new(None));
    let cell_for_handler = cell.clone();
    let lifetime = subscribe(exec, make_upstream, move |item| {
        if !predicate(&item) {
            if let Some(lifetime) = cell_for_handler.lock().clone() {
                lifetime.cancel();
            }
        }
    });
    *cell.lock() = Some(lifetime.clone());
    lifetime
}
