//! `Combine2`..`Combine5`: N-input, one-output processors with per-input
//! tagging. The `zip`/`retry` operators are built on `Combine2`.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::gate::{Admit, Gate};
use super::{Activatable, GatedSink, Next, Port, Sink};
use crate::exec::ExecContext;
use crate::item::Item;

macro_rules! define_combine {
    (
        $either:ident, $combine:ident,
        [$(($t:ident, $port_field:ident, $variant:ident, $upstream_field:ident, $make:ident)),+ $(,)?]
    ) => {
        /// Tagged union of one arrival from each of this combine's inputs.
        pub enum $either<$($t),+> {
            $($variant(Item<$t>)),+
        }

        pub struct $combine<$($t: Send + 'static,)+ Out: Send + 'static> {
            gate: Gate<$either<$($t),+>>,
            next: Next<Out>,
            handler: Mutex<Box<dyn FnMut($either<$($t),+>, &Next<Out>) + Send>>,
            $($upstream_field: Arc<dyn Activatable>,)+
            $($port_field: Arc<Port<$t>>,)+
            self_weak: Weak<Self>,
        }

        impl<$($t: Send + 'static,)+ Out: Send + 'static> $combine<$($t,)+ Out> {
            #[allow(clippy::too_many_arguments)]
            pub fn new(
                exec: Arc<dyn ExecContext>,
                next: Next<Out>,
                $($make: impl FnOnce(Arc<dyn GatedSink<$t>>) -> Arc<dyn Activatable>,)+
                handler: impl FnMut($either<$($t),+>, &Next<Out>) + Send + 'static,
            ) -> Arc<Self> {
                Arc::new_cyclic(|weak| {
                    $(
                        let slot_weak = weak.clone();
                        let $port_field = Arc::new(Port::new(
                            move |item| {
                                if let Some(this) = slot_weak.upgrade() {
                                    this.admit_arrival($either::$variant(item));
                                }
                            },
                            {
                                let slot_weak = weak.clone();
                                move || {
                                    slot_weak
                                        .upgrade()
                                        .map(|this| this.gate.is_active())
                                        .unwrap_or(false)
                                }
                            },
                        ));
                        let $upstream_field = $make($port_field.clone());
                    )+
                    Self {
                        gate: Gate::new(exec),
                        next,
                        handler: Mutex::new(Box::new(handler)),
                        $($upstream_field,)+
                        $($port_field,)+
                        self_weak: weak.clone(),
                    }
                })
            }

            fn admit_arrival(self: &Arc<Self>, arrival: $either<$($t),+>) {
                let count = self.gate.activation();
                match self.gate.admit(Item::Value(arrival), count) {
                    Admit::Discarded | Admit::Queued => {}
                    Admit::Run(Item::Value(first)) => {
                        let this = self.clone();
                        self.gate.exec().submit(Box::new(move || this.run_burst(first)));
                    }
                    Admit::Run(Item::End(_)) => unreachable!("arrivals are always Value-wrapped"),
                }
            }

            fn run_burst(self: Arc<Self>, first: $either<$($t),+>) {
                let mut current = first;
                loop {
                    (self.handler.lock())(current, &self.next);
                    match self.gate.next() {
                        Some(Item::Value(item)) => current = item,
                        _ => break,
                    }
                }
            }
        }

        impl<$($t: Send + 'static,)+ Out: Send + 'static> Activatable for $combine<$($t,)+ Out> {
            fn activate(&self) {
                if self.gate.attach().is_some() {
                    $(
                        self.$port_field.bump_activation();
                        self.$upstream_field.activate();
                    )+
                }
            }

            fn deactivate(&self) {
                if self.gate.detach() {
                    $(self.$upstream_field.deactivate();)+
                }
            }
        }
    };
}

define_combine!(Either2, Combine2, [
    (T1, port1, First, upstream1, make_upstream1),
    (T2, port2, Second, upstream2, make_upstream2),
]);

define_combine!(Either3, Combine3, [
    (T1, port1, First, upstream1, make_upstream1),
    (T2, port2, Second, upstream2, make_upstream2),
    (T3, port3, Third, upstream3, make_upstream3),
]);

define_combine!(Either4, Combine4, [
    (T1, port1, First, upstream1, make_upstream1),
    (T2, port2, Second, upstream2, make_upstream2),
    (T3, port3, Third, upstream3, make_upstream3),
    (T4, port4, Fourth, upstream4, make_upstream4),
]);

define_combine!(Either5, Combine5, [
    (T1, port1, First, upstream1, make_upstream1),
    (T2, port2, Second, upstream2, make_upstream2),
    (T3, port3, Third, upstream3, make_upstream3),
    (T4, port4, Fourth, upstream4, make_upstream4),
    (T5, port5, Fifth, upstream5, make_upstream5),
]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::InlineExec;
    use crate::item::EndReason;
    use crate::node::gate::Admit as GateAdmit;
    use crate::node::input::Input;

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
            if let GateAdmit::Run(item) = self.gate.admit(item, count) {
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

    struct NoopUpstream;
    impl Activatable for NoopUpstream {
        fn activate(&self) {}
        fn deactivate(&self) {}
    }

    #[test]
    fn zip_pairs_values_and_discards_trailing_unmatched_value() {
        let collect = Collect::<(i32, &'static str)>::new();
        collect.gate.attach();
        let next = Next::new(collect.clone());

        let mut input_a: Option<Input<i32>> = None;
        let mut input_b: Option<Input<&'static str>> = None;

        let mut pending_a: Option<i32> = None;
        let mut pending_b: Option<&'static str> = None;

        let combine = Combine2::<i32, &'static str, (i32, &'static str)>::new(
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
            move |arrival, next| match arrival {
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
                    next.send_end(reason);
                }
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
