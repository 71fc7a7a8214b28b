//! Graph node kinds: producers, processors, multi-output broadcast nodes,
//! the junction/capture/bind rewiring primitives, and sinks.

pub mod combine;
pub mod gate;
pub mod input;
pub mod interval;
pub mod junction;
pub mod merged_input;
pub mod multi;
pub mod polling;
pub mod producer;
pub mod subscriber;
pub mod transform;

use crate::activation::ActivationCount;
use crate::item::Item;

/// The downstream half of every edge: something that accepts delivery of a
/// tagged [`Item`].
///
/// # 契约说明（What）
/// - `count` must match the sink's own current activation generation or the
///   delivery is discarded — see [`gate::Gate::admit`].
/// - Implementations must not block the calling thread waiting on another
///   node's lock; `deliver` is expected to hand off to the sink's own
///   [`crate::exec::ExecContext`] and return promptly.
pub trait Sink<T>: Send + Sync {
    fn deliver(&self, item: Item<T>, count: ActivationCount);
}

/// A [`Sink`] that also exposes the bookkeeping an upstream [`input::Input`]
/// handle needs to decide whether a send should even be attempted.
pub trait GatedSink<T>: Sink<T> {
    fn activation(&self) -> ActivationCount;
    fn is_active(&self) -> bool;

    /// Whether anything is currently wired to receive this node's output.
    /// Only [`junction::Junction`] ever returns `false` here (after
    /// `disconnect`); every other node is always connected to whatever it
    /// was constructed with.
    fn is_connected(&self) -> bool {
        true
    }

    /// Exposes this node as a [`junction::JunctionLike`] when it is in fact
    /// a `Junction`, so [`junction::Junction::bind`]'s cycle check can walk
    /// a chain of rebindable successors without downcasting. Every other
    /// node kind keeps the default `None` — their wiring is fixed at
    /// construction and cannot introduce a new cycle after the fact.
    fn as_junction(&self) -> Option<&dyn junction::JunctionLike<T>> {
        None
    }
}

/// The upstream control surface every node exposes to whatever holds a
/// reference to it: activation bookkeeping and cancellation.
pub trait Activatable: Send + Sync {
    /// Called when a new subscriber chain attaches downstream of this node
    /// for the first time since it was last inactive.
    fn activate(&self);

    /// Called when the last subscriber chain downstream of this node
    /// releases. Must be idempotent against an already-inactive node.
    fn deactivate(&self);
}

/// Thin forwarding handle a processor holds onto its successor. Looks up
/// the successor's *current* activation generation on every send, so a
/// processor never has to track that bookkeeping itself.
///
/// Holds only a [`Weak`](std::sync::Weak) reference: the owning direction of
/// an edge runs predecessor→successor only through the successor's own
/// `upstream` field, so a predecessor's pointer to its successor is a
/// lookup, not a lifetime. A `Next` whose target has already been dropped
/// silently discards the send: nothing is listening anymore.
#[derive(Clone)]
pub struct Next<Out> {
    target: std::sync::Weak<dyn GatedSink<Out>>,
}

impl<Out> Next<Out> {
    pub fn new(target: std::sync::Arc<dyn GatedSink<Out>>) -> Self {
        Self {
            target: std::sync::Arc::downgrade(&target),
        }
    }

    pub fn send_value(&self, value: Out) {
        if let Some(target) = self.target.upgrade() {
            target.deliver(Item::Value(value), target.activation());
        }
    }

    pub fn send_end(&self, reason: crate::item::EndReason) {
        if let Some(target) = self.target.upgrade() {
            target.deliver(Item::End(reason), target.activation());
        }
    }
}

/// A reusable `Sink`/`GatedSink` adapter for one input slot of a many-inputs
/// node (`combine::Combine2`..`Combine5`): admission is delegated to a
/// closure so the owning node doesn't need a bespoke port type per slot.
pub struct Port<T> {
    admit: Box<dyn Fn(Item<T>) + Send + Sync>,
    is_active: Box<dyn Fn() -> bool + Send + Sync>,
    activation: parking_lot::Mutex<ActivationCount>,
}

impl<T> Port<T> {
    pub fn new(
        admit: impl Fn(Item<T>) + Send + Sync + 'static,
        is_active: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            admit: Box::new(admit),
            is_active: Box::new(is_active),
            activation: parking_lot::Mutex::new(ActivationCount::INITIAL),
        }
    }

    pub fn bump_activation(&self) -> ActivationCount {
        let mut activation = self.activation.lock();
        *activation = activation.next();
        *activation
    }
}

impl<T: Send + 'static> Sink<T> for Port<T> {
    fn deliver(&self, item: Item<T>, count: ActivationCount) {
        if *self.activation.lock() != count {
            return;
        }
        (self.admit)(item);
    }
}

impl<T: Send + 'static> GatedSink<T> for Port<T> {
    fn activation(&self) -> ActivationCount {
        *self.activation.lock()
    }

    fn is_active(&self) -> bool {
        (self.is_active)()
    }
}
