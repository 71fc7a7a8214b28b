//! Activation generation counters and the replayable caches a [`Multi`]
//! node keeps across them.
//!
//! [`Multi`]: crate::node::multi::Multi

use std::sync::Arc;

use crate::item::{EndReason, Item};

/// A monotonically increasing per-node generation tag.
///
/// # 设计背景（Why）
/// Every deactivate→activate cycle bumps this counter. Messages in flight
/// (queued before the deactivation, or produced by a predecessor that
/// hasn't yet observed the deactivation) are tagged with the *old* count;
/// a node's gate compares the tag against its current count and silently
/// discards anything stale, without requiring any coordination beyond the
/// compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivationCount(u64);

impl ActivationCount {
    pub const INITIAL: ActivationCount = ActivationCount(0);

    #[must_use]
    pub fn next(self) -> Self {
        ActivationCount(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Shapes what a [`Multi`] node caches across activations and replays to a
/// newly attached subscriber before any live value.
///
/// [`Multi`]: crate::node::multi::Multi
pub enum MultiPolicy<T> {
    /// Nothing is cached; a late subscriber only sees values emitted after
    /// it attaches.
    Multicast,
    /// The single most recent value (and a cached `End`) are replayed to a
    /// late subscriber, and that cache survives a deactivate→activate
    /// cycle — a subscriber attaching after the node has gone fully idle
    /// still observes the last value seen during the previous activation.
    Continuous,
    /// Like `Continuous`, but the cached value is scoped to the current
    /// activation only: it is replayed to any subscriber attaching while
    /// the node stays active, and is cleared the moment the node
    /// deactivates rather than surviving into the next activation.
    ContinuousWhileActive,
    /// Every value seen since the last activation is replayed, in order.
    Playback,
    /// Values are cached only until the node first becomes active, then
    /// the cache is frozen and never updated again — useful for a
    /// "warm-up" snapshot that should not keep growing under load.
    CacheUntilActive,
    /// A user-supplied updater decides what the cache becomes given the
    /// previous cache and each new value.
    CustomActivation(Arc<dyn Fn(&[T], &T) -> Vec<T> + Send + Sync>),
    /// A user-supplied fold collapses every value seen into one
    /// accumulator, which is what gets replayed.
    Reduce(Arc<dyn Fn(Option<&T>, &T) -> T + Send + Sync>),
}

impl<T> Clone for MultiPolicy<T> {
    fn clone(&self) -> Self {
        match self {
            MultiPolicy::Multicast => MultiPolicy::Multicast,
            MultiPolicy::Continuous => MultiPolicy::Continuous,
            MultiPolicy::ContinuousWhileActive => MultiPolicy::ContinuousWhileActive,
            MultiPolicy::Playback => MultiPolicy::Playback,
            MultiPolicy::CacheUntilActive => MultiPolicy::CacheUntilActive,
            MultiPolicy::CustomActivation(f) => MultiPolicy::CustomActivation(f.clone()),
            MultiPolicy::Reduce(f) => MultiPolicy::Reduce(f.clone()),
        }
    }
}

/// The cache a [`Multi`] node maintains, shaped by its [`MultiPolicy`].
///
/// [`Multi`]: crate::node::multi::Multi
pub struct ActivationValues<T> {
    values: Vec<T>,
    end: Option<EndReason>,
    frozen: bool,
}

impl<T: Clone> Default for ActivationValues<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            end: None,
            frozen: false,
        }
    }
}

impl<T: Clone> ActivationValues<T> {
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Called on every `Value`/`End` the node observes, before it is
    /// forwarded downstream, so the cache reflects what a subscriber
    /// attaching right after this call would need to be replayed.
    pub fn record(&mut self, policy: &MultiPolicy<T>, item: &Item<T>) {
        if self.frozen {
            return;
        }
        match item {
            Item::Value(value) => self.record_value(policy, value),
            Item::End(reason) => {
                self.end = Some(reason.clone());
            }
        }
    }

    fn record_value(&mut self, policy: &MultiPolicy<T>, value: &T) {
        match policy {
            MultiPolicy::Multicast => {}
            MultiPolicy::Continuous | MultiPolicy::ContinuousWhileActive => {
                self.values.clear();
                self.values.push(value.clone());
            }
            MultiPolicy::Playback | MultiPolicy::CacheUntilActive => {
                self.values.push(value.clone());
            }
            MultiPolicy::CustomActivation(updater) => {
                self.values = updater(&self.values, value);
            }
            MultiPolicy::Reduce(fold) => {
                let folded = fold(self.values.first(), value);
                self.values.clear();
                self.values.push(folded);
            }
        }
    }

    /// Called the moment the node transitions from inactive to active — the
    /// only policy this affects is `CacheUntilActive`, which stops
    /// accumulating from this point on.
    pub fn on_activated(&mut self, policy: &MultiPolicy<T>) {
        if matches!(policy, MultiPolicy::CacheUntilActive) {
            self.frozen = true;
        }
    }

    /// Called on deactivation. `CacheUntilActive` is exempt (its whole
    /// point is to survive exactly one activation's worth of churn) and so
    /// is `Continuous` (its cache is meant to outlive a deactivate→activate
    /// cycle); every other policy, including `ContinuousWhileActive`,
    /// resets so the next activation starts clean.
    pub fn on_deactivated(&mut self, policy: &MultiPolicy<T>) {
        if !matches!(policy, MultiPolicy::CacheUntilActive | MultiPolicy::Continuous) {
            self.values.clear();
            self.end = None;
            self.frozen = false;
        }
    }

    pub fn cached_values(&self) -> &[T] {
        &self.values
    }

    pub fn cached_end(&self) -> Option<&EndReason> {
        self.end.as_ref()
    }
}
