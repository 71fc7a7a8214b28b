//! Contract: a delivery tagged with an `ActivationCount` older than a
//! node's current generation is always discarded, even when the node is
//! active again by the time the stale delivery arrives.

use std::sync::{Arc, Mutex};

use conduit_core::prelude::*;

struct NoopUpstream;
impl Activatable for NoopUpstream {
    fn activate(&self) {}
    fn deactivate(&self) {}
}

#[test]
fn stale_activation_count_is_discarded_at_the_node_level() {
    super::init_tracing();
    let output: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let output_handler = output.clone();
    let transform_cell: Arc<Mutex<Option<Arc<conduit_core::node::transform::Transform<i32, i32>>>>> =
        Arc::new(Mutex::new(None));
    let cell_for_upstream = transform_cell.clone();

    let lifetime = subscribe_values::<i32>(
        Arc::new(InlineExec::new()),
        move |sink| {
            let transform = Transform::new(
                Arc::new(InlineExec::new()),
                Arc::new(NoopUpstream),
                Next::new(sink),
                |value: i32, next: &Next<i32>| next.send_value(value),
            );
            *cell_for_upstream.lock().unwrap() = Some(transform.clone());
            transform
        },
        move |v| output_handler.lock().unwrap().push(v),
    );

    let transform = transform_cell.lock().unwrap().clone().unwrap();
    let stale = transform.activation();

    // A deactivate/activate cycle bumps the generation without the test
    // going through a second real subscription.
    transform.deactivate();
    transform.activate();

    transform.deliver(Item::Value(99), stale);
    assert!(output.lock().unwrap().is_empty());

    let fresh = transform.activation();
    assert_ne!(fresh.value(), stale.value());
    transform.deliver(Item::Value(1), fresh);
    assert_eq!(*output.lock().unwrap(), vec![1]);

    lifetime.cancel();
}
