//! Contract: per-edge FIFO ordering holds even when later values are
//! admitted reentrantly (from inside an earlier value's own handler) rather
//! than arriving one at a time from the caller's own stack.

use std::sync::{Arc, Mutex};

use conduit_core::prelude::*;

struct NoopUpstream;
impl Activatable for NoopUpstream {
    fn activate(&self) {}
    fn deactivate(&self) {}
}

#[test]
fn reentrant_arrivals_preserve_fifo_order() {
    super::init_tracing();
    let output: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let input_cell: Arc<Mutex<Option<Input<i32>>>> = Arc::new(Mutex::new(None));

    let output_handler = output.clone();
    let input_for_handler = input_cell.clone();

    let lifetime = subscribe_values::<i32>(
        Arc::new(InlineExec::new()),
        move |sink| {
            let transform = Transform::new(
                Arc::new(InlineExec::new()),
                Arc::new(NoopUpstream),
                Next::new(sink),
                move |value: i32, next: &Next<i32>| {
                    if value == 1 {
                        let input = input_for_handler.lock().unwrap().clone().unwrap();
                        // Both queued while `1`'s handler is still running.
                        input.send(2).unwrap();
                        input.send(3).unwrap();
                    }
                    next.send_value(value);
                },
            );
            *input_cell.lock().unwrap() = Some(Input::new(transform.clone()));
            transform
        },
        move |v| output_handler.lock().unwrap().push(v),
    );

    let input = input_cell.lock().unwrap().clone().unwrap();
    input.send(1).unwrap();

    assert_eq!(*output.lock().unwrap(), vec![1, 2, 3]);
    lifetime.cancel();
}
