//! The per-node delivery state machine: `Disabled` / `Synchronous(count)` /
//! `Normal(count)`, with a `PendingQueue` for reentrant arrivals.
//!
//! # 设计背景（Why）
//! This is the mechanism that guarantees at most one message is being
//! processed per node at any instant, `End` is terminal, and a stale
//! `ActivationCount` is silently discarded. Every processor-shaped node
//! (`Transform`, the `Combine` family, `MergedInput`, `Multi`) owns one
//! `Gate`; it doubles as the node's downstream-subscriber refcount, since
//! "no subscribers" and "Disabled" are the same condition in this design —
//! a node with zero subscribers has nothing to forward to and so must
//! reject arrivals rather than buffer them forever.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::activation::ActivationCount;
use crate::exec::ExecContext;
use crate::item::Item;

use tracing::{debug, trace};

enum Phase {
    Disabled,
    Synchronous,
    Normal,
}

struct Inner<T> {
    phase: Phase,
    pending: VecDeque<(Item<T>, ActivationCount)>,
    activation: ActivationCount,
    subscribers: usize,
}

/// The outcome of [`Gate::admit`].
pub enum Admit<T> {
    /// The message was stale or the node is disabled; nothing to do.
    Discarded,
    /// The node is mid-burst; the message was buffered and will run once
    /// the current handler invocation returns.
    Queued,
    /// The node was idle; the caller must hand `Item` to the node's
    /// [`ExecContext`] to run the handler now (see [`Gate::exec`]).
    Run(Item<T>),
}

pub struct Gate<T> {
    exec: Arc<dyn ExecContext>,
    inner: Mutex<Inner<T>>,
}

impl<T: Send + 'static> Gate<T> {
    pub fn new(exec: Arc<dyn ExecContext>) -> Self {
        Self {
            exec,
            inner: Mutex::new(Inner {
                phase: Phase::Disabled,
                pending: VecDeque::new(),
                activation: ActivationCount::INITIAL,
                subscribers: 0,
            }),
        }
    }

    pub fn exec(&self) -> &Arc<dyn ExecContext> {
        &self.exec
    }

    pub fn activation(&self) -> ActivationCount {
        self.inner.lock().activation
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.inner.lock().phase, Phase::Disabled)
    }

    /// Registers a new downstream subscriber. Returns the fresh
    /// `ActivationCount` the first time this transitions `Disabled ->
    /// Normal`, so the caller knows to propagate `activate` upstream and
    /// replay any cached activation values under this new generation.
    #[must_use]
    pub fn attach(&self) -> Option<ActivationCount> {
        let mut inner = self.inner.lock();
        inner.subscribers += 1;
        if inner.subscribers == 1 {
            inner.activation = inner.activation.next();
            inner.phase = Phase::Normal;
            debug!(generation = inner.activation.value(), "gate activated");
            Some(inner.activation)
        } else {
            None
        }
    }

    /// Releases a downstream subscriber. Returns `true` the time this
    /// transitions to `Disabled`, so the caller knows to propagate
    /// `deactivate` upstream.
    #[must_use]
    pub fn detach(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.subscribers = inner.subscribers.saturating_sub(1);
        if inner.subscribers == 0 {
            inner.phase = Phase::Disabled;
            let dropped = inner.pending.len();
            inner.pending.clear();
            debug!(generation = inner.activation.value(), dropped, "gate deactivated");
            true
        } else {
            false
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers
    }

    /// Admits an arriving message tagged with `count`.
    pub fn admit(&self, item: Item<T>, count: ActivationCount) -> Admit<T> {
        let mut inner = self.inner.lock();
        if inner.activation != count {
            trace!(
                arrived = count.value(),
                current = inner.activation.value(),
                "discarding delivery tagged with a stale activation"
            );
            return Admit::Discarded;
        }
        match inner.phase {
            Phase::Disabled => Admit::Discarded,
            Phase::Synchronous => {
                inner.pending.push_back((item, count));
                trace!(depth = inner.pending.len(), "queued reentrant arrival");
                Admit::Queued
            }
            Phase::Normal => {
                inner.phase = Phase::Synchronous;
                Admit::Run(item)
            }
        }
    }

    /// Pops the next item to run after a handler invocation returns, or
    /// transitions back to `Normal` and returns `None` once the queue is
    /// dry. Stale entries (from a deactivate/activate cycle that happened
    /// mid-burst) are skipped rather than delivered.
    pub fn next(&self) -> Option<Item<T>> {
        let mut inner = self.inner.lock();
        let current = inner.activation;
        while let Some((item, count)) = inner.pending.pop_front() {
            if count == current {
                return Some(item);
            }
        }
        inner.phase = Phase::Normal;
        None
    }
}
