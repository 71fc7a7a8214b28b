//! `Generator` and `Preclosed`: the two non-timed leaf producers.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::gate::Gate;
use super::{Activatable, GatedSink, Next, Sink};
use crate::activation::ActivationCount;
use crate::error::SendError;
use crate::exec::InlineExec;
use crate::item::{EndReason, Item};
use tracing::debug;

/// The scoped send handle a [`Generator`] hands its `activation_change`
/// callback. Not `Clone` — it is meant to live exactly as long as the
/// activation it was issued for.
///
/// # 契约説明（What）
/// Dropping it without an explicit `end()` closes the activation with
/// `EndReason::Complete`: the handle is short-lived, scoped to one
/// activation, and dropping it from the callback closes the activation
/// stream with `Complete`.
pub struct GeneratorInput<T> {
    target: Arc<dyn GatedSink<T>>,
    count: ActivationCount,
    ended: bool,
}

impl<T> GeneratorInput<T> {
    fn new(target: Arc<dyn GatedSink<T>>, count: ActivationCount) -> Self {
        Self {
            target,
            count,
            ended: false,
        }
    }

    pub fn send(&mut self, value: T) -> Result<(), SendError> {
        self.check()?;
        self.target.deliver(Item::Value(value), self.count);
        Ok(())
    }

    pub fn end(&mut self, reason: EndReason) -> Result<(), SendError> {
        self.check()?;
        self.ended = true;
        self.target.deliver(Item::End(reason), self.count);
        Ok(())
    }

    fn check(&self) -> Result<(), SendError> {
        if self.ended {
            return Err(SendError::Disconnected);
        }
        if !self.target.is_active() || self.target.activation() != self.count {
            return Err(SendError::Inactive);
        }
        Ok(())
    }
}

impl<T> Drop for GeneratorInput<T> {
    fn drop(&mut self) {
        if !self.ended {
            self.target.deliver(Item::End(EndReason::Complete), self.count);
        }
    }
}

/// A lazy, restartable producer: `activation_change` is invoked with
/// `Some(input)` on every activation and `None` on every deactivation.
///
/// # 设计背景（Why）
/// Unlike `Transform`, `Generator` has no upstream arrivals to admit, so it
/// only uses its `Gate` for subscriber bookkeeping and activation-generation
/// tagging; forwarding is a direct pass-through to `next` guarded by an
/// activation-count comparison rather than the full admit/queue machinery.
pub struct Generator<T> {
    gate: Gate<T>,
    next: Next<T>,
    on_activation_change: Mutex<Box<dyn FnMut(Option<GeneratorInput<T>>) + Send>>,
    self_weak: Weak<Generator<T>>,
}

impl<T> Generator<T>
where
    T: Send + 'static,
{
    pub fn new(
        next: Next<T>,
        on_activation_change: impl FnMut(Option<GeneratorInput<T>>) + Send + 'static,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            gate: Gate::new(Arc::new(InlineExec::new())),
            next,
            on_activation_change: Mutex::new(Box::new(on_activation_change)),
            self_weak: weak.clone(),
        })
    }
}

impl<T> Sink<T> for Generator<T>
where
    T: Send + 'static,
{
    fn deliver(&self, item: Item<T>, count: ActivationCount) {
        if count == self.gate.activation() {
            match item {
                Item::Value(v) => self.next.send_value(v),
                Item::End(reason) => self.next.send_end(reason),
            }
        }
    }
}

impl<T> GatedSink<T> for Generator<T>
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

impl<T> Activatable for Generator<T>
where
    T: Send + 'static,
{
    fn activate(&self) {
        if let Some(count) = self.gate.attach() {
            debug!(generation = count.value(), "generator activating");
            let this: Arc<dyn GatedSink<T>> = self
                .self_weak
                .upgrade()
                .expect("Generator outlives any activate() call through its own Arc");
            let input = GeneratorInput::new(this, count);
            (self.on_activation_change.lock())(Some(input));
        }
    }

    fn deactivate(&self) {
        if self.gate.detach() {
            debug!("generator deactivating");
            (self.on_activation_change.lock())(None);
        }
    }
}

/// A producer whose values and terminal `EndReason` are fixed ahead of
/// time. Replayed synchronously on every activation — a sink subscribing
/// to a `Preclosed` observes its full sequence, including `End`, before
/// `subscribe` returns.
pub struct Preclosed<T: Clone> {
    values: Vec<T>,
    end: EndReason,
    next: Next<T>,
}

impl<T> Preclosed<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(values: Vec<T>, end: EndReason, next: Next<T>) -> Arc<Self> {
        Arc::new(Self { values, end, next })
    }
}

impl<T> Activatable for Preclosed<T>
where
    T: Clone + Send + 'static,
{
    fn activate(&self) {
        for value in &self.values {
            self.next.send_value(value.clone());
        }
        self.next.send_end(self.end.clone());
    }

    fn deactivate(&self) {}
}
