//! `Transform<In, Out>`: a single-input, single-output processor. The
//! workhorse node kind — `map`/`filter`/`scan`-shaped operators are all a
//! `Transform` with a particular closure.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::gate::{Admit, Gate};
use super::{Activatable, GatedSink, Next, Sink};
use crate::activation::ActivationCount;
use crate::exec::ExecContext;
use crate::item::{EndReason, Item};
use tracing::error;

/// A processor that runs a user handler once per admitted item and may emit
/// zero or more values downstream through [`Next`] before returning.
///
/// # 设计背景（Why）
/// Every arrival is funneled through [`Gate::admit`]; the handler itself
/// runs outside the gate's lock (`run_one` below drops the lock before
/// invoking anything user-supplied), so a handler that re-enters this same
/// `Transform` — directly, or via a cycle elsewhere in the graph — observes
/// `Admit::Queued` rather than deadlocking.
pub struct Transform<In, Out> {
    gate: Gate<In>,
    handler: Mutex<Box<dyn FnMut(In, &Next<Out>) + Send>>,
    next: Next<Out>,
    upstream: Arc<dyn Activatable>,
    self_weak: Weak<Transform<In, Out>>,
}

impl<In, Out> Transform<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    pub fn new(
        exec: Arc<dyn ExecContext>,
        upstream: Arc<dyn Activatable>,
        next: Next<Out>,
        handler: impl FnMut(In, &Next<Out>) + Send + 'static,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            gate: Gate::new(exec),
            handler: Mutex::new(Box::new(handler)),
            next,
            upstream,
            self_weak: weak.clone(),
        })
    }

    /// Runs `first`, then drains whatever queued up behind it, forwarding
    /// terminal `End` items downstream without invoking the handler — a
    /// closed input has nothing left to transform.
    fn run_burst(self: Arc<Self>, first: Item<In>) {
        let mut current = first;
        loop {
            match current {
                Item::Value(value) => {
                    let mut handler = self.handler.lock();
                    (handler)(value, &self.next);
                }
                Item::End(reason) => {
                    if let EndReason::Other(err) = &reason {
                        error!(%err, "transform forwarding an error end");
                    }
                    self.next.send_end(reason);
                }
            }
            match self.gate.next() {
                Some(item) => current = item,
                None => break,
            }
        }
    }
}

impl<In, Out> Sink<In> for Transform<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    fn deliver(&self, item: Item<In>, count: ActivationCount) {
        match self.gate.admit(item, count) {
            Admit::Discarded | Admit::Queued => {}
            Admit::Run(first) => {
                let this = self
                    .self_weak
                    .upgrade()
                    .expect("Transform outlives any delivery through its own Arc");
                self.gate.exec().submit(Box::new(move || this.run_burst(first)));
            }
        }
    }
}

impl<In, Out> GatedSink<In> for Transform<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    fn activation(&self) -> ActivationCount {
        self.gate.activation()
    }

    fn is_active(&self) -> bool {
        self.gate.is_active()
    }
}

impl<In, Out> Activatable for Transform<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    fn activate(&self) {
        if self.gate.attach().is_some() {
            self.upstream.activate();
        }
    }

    fn deactivate(&self) {
        if self.gate.detach() {
            self.upstream.deactivate();
        }
    }
}
