//! `zip`: pairs values from two streams positionally, discarding a trailing
//! unmatched value when one side ends first. A named `Combine2` instance —
//! see spec scenario 3 ("Zip correctness").

use std::sync::Arc;

use crate::exec::ExecContext;
use crate::item::{EndReason, Item};
use crate::node::combine::{Combine2, Either2};
use crate::node::{Activatable, GatedSink, Next};

/// Builds a `Combine2<A, B, (A, B)>` that emits a pair once both sides have
/// produced a value since the last pair, and closes as soon as either side
/// ends — a value pending on the other side at that point is dropped.
pub fn zip<A, B>(
    exec: Arc<dyn ExecContext>,
    next: Next<(A, B)>,
    make_a: impl FnOnce(Arc<dyn GatedSink<A>>) -> Arc<dyn Activatable>,
    make_b: impl FnOnce(Arc<dyn GatedSink<B>>) -> Arc<dyn Activatable>,
) -> Arc<Combine2<A, B, (A, B)>>
where
    A: Send + 'static,
    B: Send + 'static,
{
    let mut pending_a: Option<A> = None;
    let mut pending_b: Option<B> = None;
    let mut ended = false;

    Combine2::new(exec, next, make_a, make_b, move |arrival, next| {
        if ended {
            return;
        }
        match arrival {
            Either2::First(Item::Value(a)) => {
                pending_a = Some(a);
                if let (Some(a), Some(b)) = (pending_a.take(), pending_b.take()) {
                    next.send_value((a, b));
                }
            }
            Either2::Second(Item::Value(b)) => {
                pending_b = Some(b);
                if let (Some(a), Some(b)) = (pending_a.take(), pending_b.take()) {
                    next.send_value((a, b));
                }
            }
            Either2::First(Item::End(reason)) | Either2::Second(Item::End(reason)) => {
                ended = true;
                next.send_end(reason);
            }
        }
    })
}

/// Convenience for the common case where both sides should close the
/// output with `Complete` regardless of which side's `End` arrived first,
/// unless that `End` already carried an error.
pub fn zip_complete_on_either_end(reason: EndReason) -> EndReason {
    match reason {
        EndReason::Other(err) => EndReason::Other(err),
        _ => EndReason::Complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::InlineExec;
    use crate::node::gate::{Admit, Gate};
    use crate::node::input::Input;
    use crate::node::Sink;
    use parking_lot::Mutex;

    struct NoopUpstream;
    impl Activatable for NoopUpstream {
        fn activate(&self) {}
        fn deactivate(&self) {}
    }

    struct Collect<T> {
        gate: Gate<T>,
        seen: Mutex<Vec<Item<T>>>,
    }
    impl<T: Send + 'static> Collect<T> {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Gate::new(Arc::new(InlineExec::new())),
                seen: Mutex::new(Vec::new()),
            })
        }
    }
    impl<T: Send + 'static> Sink<T> for Collect<T> {
        fn deliver(&self, item: Item<T>, count: crate::activation::ActivationCount) {
            if let Admit::Run(item) = self.gate.admit(item, count) {
                self.seen.lock().push(item);
                self.gate.next();
            }
        }
    }
    impl<T: Send + 'static> GatedSink<T> for Collect<T> {
        fn activation(&self) -> crate::activation::ActivationCount {
            self.gate.activation()
        }
        fn is_active(&self) -> bool {
            self.gate.is_active()
        }
    }

    #[test]
    fn zips_pairs_and_discards_trailing_unmatched_value() {
        let collect = Collect::<(i32, &'static str)>::new();
        collect.gate.attach();
        let next = Next::new(collect.clone());

        let mut input_a: Option<Input<i32>> = None;
        let mut input_b: Option<Input<&'static str>> = None;

        let combine = zip(
            Arc::new(InlineExec::new()),
            next,
            |port| {
                input_a = Some(Input::new(port));
                Arc::new(NoopUpstream)
            },
            |port| {
                input_b = Some(Input::new(port));
                Arc::new(NoopUpstream)
            },
        );
        combine.activate();

        let input_a = input_a.unwrap();
        let input_b = input_b.unwrap();
        input_a.send(1).unwrap();
        input_b.send("a").unwrap();
        input_a.send(2).unwrap();
        input_b.send("b").unwrap();
        input_a.send(3).unwrap();
        input_a.end(EndReason::Complete).unwrap();

        let seen = collect.seen.lock();
        assert!(matches!(seen[0], Item::Value((1, "a"))));
        assert!(matches!(seen[1], Item::Value((2, "b"))));
        assert!(matches!(seen[2], Item::End(EndReason::Complete)));
        assert_eq!(seen.len(), 3);
    }
}
