//! `MergedInput`: dynamic fan-in accepting signals at runtime, each with its
//! own [`ClosePropagation`] policy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::gate::{Admit, Gate};
use super::{Activatable, GatedSink, Next, Sink};
use crate::activation::ActivationCount;
use crate::error::BindError;
use crate::exec::ExecContext;
use crate::item::{EndReason, Item};
use tracing::{debug, error};

/// How an individual input's `End` affects the merged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosePropagation {
    /// The input is detached; the output is unaffected.
    None,
    /// Only `End(Other(_))` closes the output; `Complete`/`Cancelled` just
    /// detach this input.
    Errors,
    /// `End(Complete)` closes the output; other reasons just detach.
    Closed,
    /// Any `End` closes the output.
    All,
}

impl ClosePropagation {
    fn closes_output(self, reason: &EndReason) -> bool {
        match self {
            ClosePropagation::None => false,
            ClosePropagation::Errors => reason.is_error(),
            ClosePropagation::Closed => reason.is_complete(),
            ClosePropagation::All => true,
        }
    }
}

enum Arrival<T> {
    Value(usize, T),
    End(usize, EndReason),
}

struct InputSlot {
    policy: ClosePropagation,
    remove_on_deactivate: bool,
    upstream: Arc<dyn Activatable>,
}

/// The per-added-input delivery target a `MergedInput` hands to whatever
/// upstream it is wired to. Each port tracks its own upstream's activation
/// generation independently, since every added signal has its own
/// `ActivationCount` sequence.
struct Port<T> {
    merged: Weak<MergedInput<T>>,
    id: usize,
    activation: Mutex<ActivationCount>,
}

impl<T> Sink<T> for Port<T>
where
    T: Send + 'static,
{
    fn deliver(&self, item: Item<T>, count: ActivationCount) {
        if *self.activation.lock() != count {
            return;
        }
        if let Some(merged) = self.merged.upgrade() {
            match item {
                Item::Value(v) => merged.admit_arrival(Arrival::Value(self.id, v)),
                Item::End(reason) => merged.admit_arrival(Arrival::End(self.id, reason)),
            }
        }
    }
}

impl<T> GatedSink<T> for Port<T>
where
    T: Send + 'static,
{
    fn activation(&self) -> ActivationCount {
        *self.activation.lock()
    }

    fn is_active(&self) -> bool {
        self.merged
            .upgrade()
            .map(|m| m.gate.is_active())
            .unwrap_or(false)
    }
}

/// `add` registers a not-yet-built upstream via a factory so the caller can
/// construct that upstream with this `MergedInput`'s port as its `next`
/// target in one step, mirroring how every other node kind fixes its wiring
/// at construction time.
pub struct MergedInput<T: Send + 'static> {
    gate: Gate<Arrival<T>>,
    next: Next<T>,
    inputs: Mutex<HashMap<usize, InputSlot>>,
    ports: Mutex<HashMap<usize, Arc<Port<T>>>>,
    next_input_id: AtomicUsize,
    on_last_input_closed: Option<EndReason>,
    terminal: AtomicBool,
}

impl<T> MergedInput<T>
where
    T: Send + 'static,
{
    pub fn new(
        exec: Arc<dyn ExecContext>,
        next: Next<T>,
        on_last_input_closed: Option<EndReason>,
    ) -> Arc<Self> {
        Arc::new(Self {
            gate: Gate::new(exec),
            next,
            inputs: Mutex::new(HashMap::new()),
            ports: Mutex::new(HashMap::new()),
            next_input_id: AtomicUsize::new(0),
            on_last_input_closed,
            terminal: AtomicBool::new(false),
        })
    }

    /// Adds a new input. `make_upstream` receives this input's port (already
    /// wrapped as a `GatedSink`) and must return the `Activatable` handle
    /// for the upstream it wires the port into.
    pub fn add(
        self: &Arc<Self>,
        make_upstream: impl FnOnce(Arc<dyn GatedSink<T>>) -> Arc<dyn Activatable>,
        policy: ClosePropagation,
        remove_on_deactivate: bool,
    ) -> Result<usize, BindError> {
        if self.terminal.load(Ordering::SeqCst) {
            return Err(BindError::Cancelled);
        }
        let id = self.next_input_id.fetch_add(1, Ordering::SeqCst);
        let port = Arc::new(Port {
            merged: Arc::downgrade(self),
            id,
            activation: Mutex::new(ActivationCount::INITIAL),
        });
        let upstream = make_upstream(port.clone());

        let mut inputs = self.inputs.lock();
        if self.terminal.load(Ordering::SeqCst) {
            return Err(BindError::Cancelled);
        }
        inputs.insert(
            id,
            InputSlot {
                policy,
                remove_on_deactivate,
                upstream: upstream.clone(),
            },
        );
        self.ports.lock().insert(id, port.clone());
        drop(inputs);

        if self.gate.is_active() {
            let mut activation = port.activation.lock();
            *activation = activation.next();
            drop(activation);
            upstream.activate();
        }
        Ok(id)
    }

    /// Explicitly removes an input without going through its own `End` —
    /// the output is unaffected regardless of that input's policy.
    pub fn remove(&self, id: usize) {
        let slot = self.inputs.lock().remove(&id);
        self.ports.lock().remove(&id);
        if let Some(slot) = slot {
            slot.upstream.deactivate();
        }
    }

    fn admit_arrival(self: &Arc<Self>, arrival: Arrival<T>) {
        let count = self.gate.activation();
        match self.gate.admit(Item::Value(arrival), count) {
            Admit::Discarded | Admit::Queued => {}
            Admit::Run(Item::Value(first)) => {
                let this = self.clone();
                self.gate
                    .exec()
                    .submit(Box::new(move || this.run_burst(first)));
            }
            Admit::Run(Item::End(_)) => unreachable!("arrivals are always Value-wrapped"),
        }
    }

    fn run_burst(self: Arc<Self>, first: Arrival<T>) {
        let mut current = first;
        loop {
            self.handle_arrival(current);
            match self.gate.next() {
                Some(Item::Value(item)) => current = item,
                _ => break,
            }
        }
    }

    fn handle_arrival(&self, arrival: Arrival<T>) {
        if self.terminal.load(Ordering::SeqCst) {
            return;
        }
        match arrival {
            Arrival::Value(_id, value) => self.next.send_value(value),
            Arrival::End(id, reason) => {
                let policy = self.inputs.lock().get(&id).map(|slot| slot.policy);
                let Some(policy) = policy else {
                    return;
                };
                if let EndReason::Other(err) = &reason {
                    error!(%err, input = id, "merged input saw an error end");
                }
                if policy.closes_output(&reason) {
                    debug!(input = id, ?policy, "merged input closing output");
                    self.terminal.store(true, Ordering::SeqCst);
                    self.inputs.lock().clear();
                    self.ports.lock().clear();
                    self.next.send_end(reason);
                    return;
                }
                self.inputs.lock().remove(&id);
                self.ports.lock().remove(&id);
                if self.inputs.lock().is_empty() {
                    if let Some(end) = self.on_last_input_closed.clone() {
                        debug!("merged input closing after its last input detached");
                        self.terminal.store(true, Ordering::SeqCst);
                        self.next.send_end(end);
                    }
                }
            }
        }
    }
}

impl<T> Activatable for MergedInput<T>
where
    T: Send + 'static,
{
    fn activate(&self) {
        if self.gate.attach().is_some() {
            let entries: Vec<(usize, Arc<dyn Activatable>)> = self
                .inputs
                .lock()
                .iter()
                .map(|(id, slot)| (*id, slot.upstream.clone()))
                .collect();
            for (id, upstream) in entries {
                if let Some(port) = self.ports.lock().get(&id) {
                    let mut activation = port.activation.lock();
                    *activation = activation.next();
                }
                upstream.activate();
            }
        }
    }

    fn deactivate(&self) {
        if self.gate.detach() {
            let mut inputs = self.inputs.lock();
            let to_remove: Vec<usize> = inputs
                .iter()
                .filter(|(_, slot)| slot.remove_on_deactivate)
                .map(|(id, _)| *id)
                .collect();
            for slot in inputs.values() {
                slot.upstream.deactivate();
            }
            for id in to_remove {
                inputs.remove(&id);
                self.ports.lock().remove(&id);
            }
        }
    }
}
