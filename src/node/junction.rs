//! `Junction` (severable splice) and `Capture` (snapshot + pending bind).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::gate::{Admit, Gate};
use super::input::Input;
use super::multi::Multi;
use super::{Activatable, GatedSink, Sink};
use crate::activation::ActivationCount;
use crate::error::{BindError, CoreError};
use crate::exec::ExecContext;
use crate::item::{EndReason, Item};
use tracing::{debug, error};

/// Lets [`Junction::bind`]'s cycle check see through a successor that is
/// itself a `Junction`, without downcasting via `Any`.
pub trait JunctionLike<T>: Send + Sync {
    fn successor_target(&self) -> Option<Arc<dyn GatedSink<T>>>;
    fn identity(&self) -> *const ();
}

type OnErrorHandler<T> = dyn Fn(&Junction<T>, &CoreError, &Item<T>) + Send + Sync;

/// A cut-point between an upstream and a downstream successor. `disconnect`
/// severs the link and suspends the upstream (propagates `deactivate`)
/// until `bind` reconnects a (possibly different) successor.
pub struct Junction<T: Send + 'static> {
    gate: Gate<T>,
    successor: Mutex<Option<Weak<dyn GatedSink<T>>>>,
    on_error: Mutex<Option<Arc<OnErrorHandler<T>>>>,
    upstream: Arc<dyn Activatable>,
    bound: AtomicBool,
    self_weak: Weak<Junction<T>>,
}

impl<T> Junction<T>
where
    T: Send + 'static,
{
    pub fn new(
        exec: Arc<dyn ExecContext>,
        upstream: Arc<dyn Activatable>,
        successor: Arc<dyn GatedSink<T>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            gate: Gate::new(exec),
            successor: Mutex::new(Some(Arc::downgrade(&successor))),
            on_error: Mutex::new(None),
            upstream,
            bound: AtomicBool::new(true),
            self_weak: weak.clone(),
        })
    }

    /// Severs the link to the current successor and returns it, if it is
    /// still alive. Suspends the upstream (if this junction is currently
    /// active) until the next `bind`.
    pub fn disconnect(&self) -> Option<Arc<dyn GatedSink<T>>> {
        let severed = self.successor.lock().take();
        if self.bound.swap(false, Ordering::SeqCst) && self.gate.is_active() {
            self.upstream.deactivate();
        }
        debug!("junction disconnected");
        severed.and_then(|weak| weak.upgrade())
    }

    /// Binds a new successor. Fails with `Duplicate` if one is already
    /// bound — `disconnect` first. Fails with `Loop` if `to` is (or
    /// transitively forwards into) this junction itself.
    pub fn bind(&self, to: Arc<dyn GatedSink<T>>) -> Result<(), BindError> {
        self.bind_with(to, |_junction, _err, _input| {})
    }

    /// Binds a new successor, as `bind`, invoking `on_error` instead of
    /// silently forwarding whenever the bound successor's chain later
    /// reports an error end through this junction. `on_error` receives this
    /// junction, the error, and the item that triggered it.
    pub fn bind_with(
        &self,
        to: Arc<dyn GatedSink<T>>,
        on_error: impl Fn(&Junction<T>, &crate::error::CoreError, &Item<T>) + Send + Sync + 'static,
    ) -> Result<(), BindError> {
        if would_cycle(&to, self) {
            debug!("rejected bind that would close a junction cycle");
            return Err(BindError::Loop);
        }
        let mut successor = self.successor.lock();
        if successor.as_ref().and_then(|w| w.upgrade()).is_some() {
            return Err(BindError::Duplicate);
        }
        *successor = Some(Arc::downgrade(&to));
        drop(successor);
        *self.on_error.lock() = Some(Arc::new(on_error));
        if !self.bound.swap(true, Ordering::SeqCst) && self.gate.is_active() {
            self.upstream.activate();
        }
        debug!("junction bound to a new successor");
        Ok(())
    }

    fn run_burst(self: Arc<Self>, first: Item<T>) {
        let mut current = first;
        loop {
            if let Some(successor) = self.successor.lock().as_ref().and_then(|w| w.upgrade()) {
                if let Item::End(EndReason::Other(err)) = &current {
                    error!(%err, "junction forwarding an error end");
                    if let Some(handler) = self.on_error.lock().clone() {
                        handler(self.as_ref(), err, &current);
                    }
                }
                let activation = successor.activation();
                successor.deliver(current, activation);
            }
            match self.gate.next() {
                Some(item) => current = item,
                None => break,
            }
        }
    }
}

impl<T: Send + 'static> JunctionLike<T> for Junction<T> {
    fn successor_target(&self) -> Option<Arc<dyn GatedSink<T>>> {
        self.successor.lock().as_ref().and_then(|w| w.upgrade())
    }

    fn identity(&self) -> *const () {
        self as *const Junction<T> as *const ()
    }
}

/// Walks `candidate`'s own successor chain (following it only while each
/// link is itself a `Junction` — the sole rebindable edge kind) to check
/// whether binding it into `target` would route `target`'s own output back
/// into itself. Every other node kind fixes its forwarding wiring at
/// construction, so it cannot introduce a cycle after the graph is built.
fn would_cycle<T: Send + 'static>(candidate: &Arc<dyn GatedSink<T>>, target: &Junction<T>) -> bool {
    let target_id = target as *const Junction<T> as *const ();
    let mut current: Option<Arc<dyn GatedSink<T>>> = Some(candidate.clone());
    while let Some(node) = current {
        let Some(junction) = node.as_junction() else {
            break;
        };
        if junction.identity() == target_id {
            return true;
        }
        current = junction.successor_target();
    }
    false
}

impl<T> Sink<T> for Junction<T>
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
                    .expect("Junction outlives any delivery through its own Arc");
                self.gate.exec().submit(Box::new(move || this.run_burst(first)));
            }
        }
    }
}

impl<T> GatedSink<T> for Junction<T>
where
    T: Send + 'static,
{
    fn activation(&self) -> ActivationCount {
        self.gate.activation()
    }

    fn is_active(&self) -> bool {
        self.gate.is_active()
    }

    fn is_connected(&self) -> bool {
        self.bound.load(Ordering::SeqCst)
    }

    fn as_junction(&self) -> Option<&dyn JunctionLike<T>> {
        Some(self)
    }
}

impl<T> Activatable for Junction<T>
where
    T: Send + 'static,
{
    fn activate(&self) {
        if self.gate.attach().is_some() && self.bound.load(Ordering::SeqCst) {
            self.upstream.activate();
        }
    }

    fn deactivate(&self) {
        if self.gate.detach() && self.bound.load(Ordering::SeqCst) {
            self.upstream.deactivate();
        }
    }
}

/// A one-shot snapshot of a [`Multi`]'s cached activation values plus its
/// cached `End`, with a pending successor binding.
///
/// # 设计背景（Why）
/// Snapshots the activation value(s) + pending `End` from upstream at
/// creation time. Built directly on [`Multi::snapshot`] /
/// [`Multi::add_subscriber`] rather than duplicating cache bookkeeping.
pub struct Capture<T: Clone + Send + 'static> {
    values: Vec<T>,
    end: Option<crate::item::EndReason>,
    multi: Arc<Multi<T>>,
}

impl<T> Capture<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(multi: Arc<Multi<T>>) -> Self {
        let (values, end) = multi.snapshot();
        Self { values, end, multi }
    }

    /// Reads the snapshot without binding.
    pub fn current_value(&self) -> Option<&T> {
        self.values.last()
    }

    /// Binds `sink` to the captured upstream. When `resend` is set, the
    /// captured values (and cached `End`, if any) are replayed to `sink`
    /// before it is registered as a live subscriber.
    pub fn bind(&self, sink: Arc<dyn GatedSink<T>>, resend: bool) -> Result<(), BindError> {
        if resend {
            let activation = sink.activation();
            for value in &self.values {
                sink.deliver(Item::Value(value.clone()), activation);
            }
            if let Some(end) = &self.end {
                sink.deliver(Item::End(end.clone()), activation);
            }
        }
        if self.end.is_some() {
            return Err(BindError::Cancelled);
        }
        self.multi.add_subscriber(sink);
        Ok(())
    }
}

/// Pairs a [`Junction`] with the [`Input`] that feeds it, so a caller that
/// repeatedly disconnects and rebinds a single splice point doesn't have to
/// keep the two handles separate.
pub struct Reconnector<T: Send + 'static> {
    junction: Arc<Junction<T>>,
    input: Input<T>,
}

impl<T> Reconnector<T>
where
    T: Send + 'static,
{
    pub fn new(junction: Arc<Junction<T>>) -> Self {
        let input = Input::new(junction.clone());
        Self { junction, input }
    }

    /// The imperative send handle feeding this reconnector's junction.
    pub fn input(&self) -> &Input<T> {
        &self.input
    }

    /// The underlying junction, for callers that need `is_connected`/
    /// `activate`/`deactivate` directly.
    pub fn junction(&self) -> &Arc<Junction<T>> {
        &self.junction
    }

    /// Severs whatever successor is currently bound (a no-op if none is)
    /// and binds `to` in its place.
    pub fn reconnect(&self, to: Arc<dyn GatedSink<T>>) -> Result<(), BindError> {
        self.junction.disconnect();
        self.junction.bind(to)
    }

    /// As [`Reconnector::reconnect`], but installs `on_error` on the new
    /// binding — see [`Junction::bind_with`].
    pub fn reconnect_with(
        &self,
        to: Arc<dyn GatedSink<T>>,
        on_error: impl Fn(&Junction<T>, &CoreError, &Item<T>) + Send + Sync + 'static,
    ) -> Result<(), BindError> {
        self.junction.disconnect();
        self.junction.bind_with(to, on_error)
    }

    /// Severs the current successor without rebinding.
    pub fn disconnect(&self) -> Option<Arc<dyn GatedSink<T>>> {
        self.junction.disconnect()
    }
}
