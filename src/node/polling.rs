//! `SignalLatest` and `peek`: the polling escape hatches. These are a
//! subscriber holding a locked slot — not a core delivery mechanism.

use std::sync::{Arc, Mutex};

use super::subscriber::{subscribe, Lifetime};
use super::{Activatable, GatedSink};
use crate::exec::ExecContext;
use crate::item::{EndReason, Item};

/// A thread-safe cache of the most recent value (and terminal reason, if
/// any) observed on a stream. Accessors take the lock briefly; this is
/// meant for occasional reads from outside the graph, not a hot path.
pub struct SignalLatest<T: Clone + Send + 'static> {
    latest: Arc<Mutex<Option<T>>>,
    ended: Arc<Mutex<Option<EndReason>>>,
    lifetime: Lifetime,
}

impl<T> SignalLatest<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(
        exec: Arc<dyn ExecContext>,
        make_upstream: impl FnOnce(Arc<dyn GatedSink<T>>) -> Arc<dyn Activatable>,
    ) -> Self {
        let latest = Arc::new(Mutex::new(None));
        let ended = Arc::new(Mutex::new(None));
        let latest_handler = latest.clone();
        let ended_handler = ended.clone();
        let lifetime = subscribe(exec, make_upstream, move |item| match item {
            Item::Value(value) => *latest_handler.lock().unwrap() = Some(value),
            Item::End(reason) => *ended_handler.lock().unwrap() = Some(reason),
        });
        Self {
            latest,
            ended,
            lifetime,
        }
    }

    pub fn get(&self) -> Option<T> {
        self.latest.lock().unwrap().clone()
    }

    pub fn ended(&self) -> Option<EndReason> {
        self.ended.lock().unwrap().clone()
    }

    pub fn cancel(&self) {
        self.lifetime.cancel();
    }
}

/// Subscribes, captures the first value observed (typically during the
/// synchronous activation burst of an already-cached or preclosed source),
/// then cancels immediately.
pub fn peek<T>(
    exec: Arc<dyn ExecContext>,
    make_upstream: impl FnOnce(Arc<dyn GatedSink<T>>) -> Arc<dyn Activatable>,
) -> Option<T>
where
    T: Send + 'static,
{
    let value = Arc::new(Mutex::new(None));
    let value_handler = value.clone();
    let lifetime = subscribe(exec, make_upstream, move |item| {
        if let Item::Value(v) = item {
            let mut slot = value_handler.lock().unwrap();
            if slot.is_none() {
                *slot = Some(v);
            }
        }
    });
    lifetime.cancel();
    drop(lifetime);
    match Arc::try_unwrap(value) {
        Ok(cell) => cell.into_inner().unwrap(),
        Err(_) => None,
    }
}
