//! `Multi`: broadcasts one upstream stream to many downstream subscribers,
//! replaying a policy-shaped cache of activation values to each newcomer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::gate::{Admit, Gate};
use super::{Activatable, GatedSink, Sink};
use crate::activation::{ActivationCount, ActivationValues, MultiPolicy};
use crate::exec::ExecContext;
use crate::item::{EndReason, Item};
use tracing::{debug, error, trace};

/// A fan-out node shaped by a [`MultiPolicy`], broadcasting one upstream
/// stream to many downstream subscribers via the `ActivationValues` cache.
///
/// # 设计背景（Why）
/// Upstream delivery still goes through a [`Gate`] — a `Multi` is a node
/// like any other and must serialize its own handler (recording into the
/// cache, then broadcasting) even though it fans out to many sinks. Per-
/// subscriber attach/detach is tracked separately from the gate's own
/// subscriber count, since the gate only needs to know "is anyone attached
/// at all" to decide whether to propagate activate/deactivate upstream.
pub struct Multi<T: Clone + Send + 'static> {
    gate: Gate<T>,
    policy: MultiPolicy<T>,
    cache: Mutex<ActivationValues<T>>,
    subscribers: Mutex<HashMap<u64, Weak<dyn GatedSink<T>>>>,
    next_sub_id: AtomicU64,
    upstream: Arc<dyn Activatable>,
    self_weak: Weak<Multi<T>>,
}

impl<T> Multi<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(
        exec: Arc<dyn ExecContext>,
        upstream: Arc<dyn Activatable>,
        policy: MultiPolicy<T>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            gate: Gate::new(exec),
            policy,
            cache: Mutex::new(ActivationValues::default()),
            subscribers: Mutex::new(HashMap::new()),
            next_sub_id: AtomicU64::new(0),
            upstream,
            self_weak: weak.clone(),
        })
    }

    /// Registers `sink` as a subscriber, replaying the current cache to it
    /// synchronously before returning: cached `End` (and any cached values)
    /// are observed before any live value. Returns an id
    /// [`Multi::remove_subscriber`] later consumes.
    pub fn add_subscriber(&self, sink: Arc<dyn GatedSink<T>>) -> u64 {
        let id = self.next_sub_id.fetch_add(1, Ordering::SeqCst);
        let became_active = {
            let mut subs = self.subscribers.lock();
            let was_empty = subs.is_empty();
            subs.insert(id, Arc::downgrade(&sink));
            was_empty
        };
        if became_active {
            if self.gate.attach().is_some() {
                self.cache.lock().on_activated(&self.policy);
                self.upstream.activate();
                debug!("multi activated on first subscriber");
            }
        }
        let cache = self.cache.lock();
        let activation = sink.activation();
        for value in cache.cached_values() {
            sink.deliver(Item::Value(value.clone()), activation);
        }
        if let Some(reason) = cache.cached_end() {
            sink.deliver(Item::End(reason.clone()), activation);
        }
        id
    }

    /// Releases the subscription `id` added. A no-op if it was already
    /// removed — detach must tolerate double-release from idempotent
    /// cancellation.
    /// A one-time read of the current cache, used by [`super::junction::Capture`]
    /// to snapshot activation values without subscribing.
    pub fn snapshot(&self) -> (Vec<T>, Option<crate::item::EndReason>) {
        let cache = self.cache.lock();
        (cache.cached_values().to_vec(), cache.cached_end().cloned())
    }

    pub fn remove_subscriber(&self, id: u64) {
        let became_empty = {
            let mut subs = self.subscribers.lock();
            if subs.remove(&id).is_none() {
                return;
            }
            subs.is_empty()
        };
        if became_empty && self.gate.detach() {
            self.cache.lock().on_deactivated(&self.policy);
            self.upstream.deactivate();
            debug!("multi deactivated after last subscriber left");
        }
    }

    fn run_burst(self: Arc<Self>, first: Item<T>) {
        let mut current = first;
        loop {
            self.cache.lock().record(&self.policy, &current);
            if let Item::End(EndReason::Other(err)) = &current {
                error!(%err, "multi broadcasting an error end");
            }
            let mut dead = Vec::new();
            let subs: Vec<Arc<dyn GatedSink<T>>> = self
                .subscribers
                .lock()
                .iter()
                .filter_map(|(id, weak)| match weak.upgrade() {
                    Some(sink) => Some(sink),
                    None => {
                        dead.push(*id);
                        None
                    }
                })
                .collect();
            if !dead.is_empty() {
                let mut subscribers = self.subscribers.lock();
                for id in dead {
                    subscribers.remove(&id);
                }
                trace!(count = subs.len(), "pruned subscribers dropped without unsubscribing");
            }
            for sub in &subs {
                let activation = sub.activation();
                sub.deliver(current.clone(), activation);
            }
            match self.gate.next() {
                Some(item) => current = item,
                None => break,
            }
        }
    }
}

impl<T> Sink<T> for Multi<T>
where
    T: Clone + Send + 'static,
{
    fn deliver(&self, item: Item<T>, count: ActivationCount) {
        match self.gate.admit(item, count) {
            Admit::Discarded | Admit::Queued => {}
            Admit::Run(first) => {
                let this = self
                    .self_weak
                    .upgrade()
                    .expect("Multi outlives any delivery through its own Arc");
                self.gate.exec().submit(Box::new(move || this.run_burst(first)));
            }
        }
    }
}

impl<T> GatedSink<T> for Multi<T>
where
    T: Clone + Send + 'static,
{
    fn activation(&self) -> ActivationCount {
        self.gate.activation()
    }

    fn is_active(&self) -> bool {
        self.gate.is_active()
    }
}

/// Adapts one subscriber's relationship to a [`Multi`] into the generic
/// [`Activatable`] interface other node kinds hold their upstream through.
pub struct MultiSubscription<T: Clone + Send + 'static> {
    multi: Arc<Multi<T>>,
    sink: Weak<dyn GatedSink<T>>,
    id: Mutex<Option<u64>>,
}

impl<T> MultiSubscription<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(multi: Arc<Multi<T>>, sink: Arc<dyn GatedSink<T>>) -> Arc<Self> {
        Arc::new(Self {
            multi,
            sink: Arc::downgrade(&sink),
            id: Mutex::new(None),
        })
    }
}

impl<T> Activatable for MultiSubscription<T>
where
    T: Clone + Send + 'static,
{
    fn activate(&self) {
        let mut id = self.id.lock();
        if id.is_none() {
            if let Some(sink) = self.sink.upgrade() {
                *id = Some(self.multi.add_subscriber(sink));
            }
        }
    }

    fn deactivate(&self) {
        if let Some(id) = self.id.lock().take() {
            self.multi.remove_subscriber(id);
        }
    }
}
