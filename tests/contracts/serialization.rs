//! Contract: a node's handler is never invoked concurrently with itself. A
//! reentrant send arriving while a handler is on the stack is queued and
//! drained only after that handler returns — never interleaved with it.

use std::sync::{Arc, Mutex};

use conduit_core::prelude::*;

struct NoopUpstream;
impl Activatable for NoopUpstream {
    fn activate(&self) {}
    fn deactivate(&self) {}
}

#[test]
fn reentrant_send_during_handler_is_queued_not_concurrent() {
    super::init_tracing();
    let output: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let input_cell: Arc<Mutex<Option<Input<i32>>>> = Arc::new(Mutex::new(None));

    let output_handler = output.clone();
    let order_handler = order.clone();
    let input_for_handler = input_cell.clone();

    let lifetime = subscribe_values::<i32>(
        Arc::new(InlineExec::new()),
        move |sink| {
            let transform = Transform::new(
                Arc::new(InlineExec::new()),
                Arc::new(NoopUpstream),
                Next::new(sink),
                move |value: i32, next: &Next<i32>| {
                    order_handler.lock().unwrap().push("enter");
                    if value == 1 {
                        // Fires while this very call is still on the stack.
                        if let Some(input) = input_for_handler.lock().unwrap().as_ref() {
                            input.send(2).unwrap();
                        }
                    }
                    next.send_value(value);
                    order_handler.lock().unwrap().push("exit");
                },
            );
            *input_cell.lock().unwrap() = Some(Input::new(transform.clone()));
            transform
        },
        move |v| output_handler.lock().unwrap().push(v),
    );

    let input = input_cell.lock().unwrap().clone().unwrap();
    input.send(1).unwrap();

    // The reentrant send for `2` only runs after the handler for `1` has
    // fully returned — no "enter" for 2 appears between "enter"/"exit" for 1.
    assert_eq!(*order.lock().unwrap(), vec!["enter", "exit", "enter", "exit"]);
    assert_eq!(*output.lock().unwrap(), vec![1, 2]);

    lifetime.cancel();
}
