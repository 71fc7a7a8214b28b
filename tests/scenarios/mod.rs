//! Black-box integration tests for the six concrete scenarios worked
//! through as part of the design notes, exercised here against the public
//! `conduit_core::prelude` surface rather than any module-internal test
//! fixture.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use conduit_core::prelude::*;

struct NoopUpstream;
impl Activatable for NoopUpstream {
    fn activate(&self) {}
    fn deactivate(&self) {}
}

/// Scenario 1: activation burst. A `Continuous` `Multi` holding the latest
/// value (42) must replay it to a subscriber synchronously, before the
/// subscriber has any chance to observe a later, live value.
#[test]
fn activation_burst_replays_latest_continuous_value_before_subscribe_returns() {
    let multi = Multi::<i32>::new(Arc::new(InlineExec::new()), Arc::new(NoopUpstream), MultiPolicy::Continuous);
    let keepalive = subscribe_values::<i32>(
        Arc::new(InlineExec::new()),
        {
            let multi = multi.clone();
            move |sink| {
                let subscription = MultiSubscription::new(multi.clone(), sink);
                subscription.activate();
                subscription
            }
        },
        |_| {},
    );
    let input = Input::new(multi.clone());
    input.send(42).unwrap();

    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let order_handler = order.clone();
    let _late = subscribe_values::<i32>(
        Arc::new(InlineExec::new()),
        {
            let multi = multi.clone();
            move |sink| {
                order_handler.lock().unwrap().push("during-subscribe");
                let subscription = MultiSubscription::new(multi.clone(), sink);
                subscription.activate();
                subscription
            }
        },
        move |v| {
            assert_eq!(v, 42);
        },
    );

    assert_eq!(*order.lock().unwrap(), vec!["during-subscribe"]);
    keepalive.cancel();
}

/// Scenario 2: `MergedInput` with `ClosePropagation::Errors`. A `Complete`
/// on one input only detaches it; an `Other(_)` on another closes the
/// merged output.
#[test]
fn merged_input_errors_policy_closes_only_on_error() {
    let seen: Arc<Mutex<Vec<Item<i32>>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_handler = seen.clone();
    let lifetime = subscribe::<i32>(
        Arc::new(InlineExec::new()),
        move |sink| {
            let merged = MergedInput::<i32>::new(Arc::new(InlineExec::new()), Next::new(sink), None);
            merged.activate();

            let mut input_a: Option<Input<i32>> = None;
            merged
                .add(
                    |port| {
                        input_a = Some(Input::new(port));
                        Arc::new(NoopUpstream)
                    },
                    ClosePropagation::Errors,
                    false,
                )
                .unwrap();
            let mut input_b: Option<Input<i32>> = None;
            merged
                .add(
                    |port| {
                        input_b = Some(Input::new(port));
                        Arc::new(NoopUpstream)
                    },
                    ClosePropagation::Errors,
                    false,
                )
                .unwrap();

            let input_a = input_a.unwrap();
            let input_b = input_b.unwrap();
            input_a.send(1).unwrap();
            input_a.end(EndReason::Complete).unwrap();
            input_b.send(2).unwrap();
            input_b.end(EndReason::Other(CoreError::new("x"))).unwrap();

            merged
        },
        move |item| seen_handler.lock().unwrap().push(item),
    );

    let seen = seen.lock().unwrap();
    assert!(matches!(seen[0], Item::Value(1)));
    assert!(matches!(seen[1], Item::Value(2)));
    assert!(matches!(seen[2], Item::End(EndReason::Other(_))));
    assert_eq!(seen.len(), 3);
    lifetime.cancel();
}

/// Scenario 3: zip correctness. A trailing unmatched value on the longer
/// side is discarded once the shorter side ends.
#[test]
fn zip_discards_trailing_unmatched_value() {
    let pairs: Arc<Mutex<Vec<Item<(i32, &'static str)>>>> = Arc::new(Mutex::new(Vec::new()));
    let pairs_handler = pairs.clone();
    let lifetime = subscribe::<(i32, &'static str)>(
        Arc::new(InlineExec::new()),
        move |sink| {
            let mut input_a: Option<Input<i32>> = None;
            let mut input_b: Option<Input<&'static str>> = None;
            let combine = zip(
                Arc::new(InlineExec::new()),
                Next::new(sink),
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

            combine
        },
        move |item| pairs_handler.lock().unwrap().push(item),
    );

    let pairs = pairs.lock().unwrap();
    assert!(matches!(pairs[0], Item::Value((1, "a"))));
    assert!(matches!(pairs[1], Item::Value((2, "b"))));
    assert!(matches!(pairs[2], Item::End(EndReason::Complete)));
    assert_eq!(pairs.len(), 3);
    lifetime.cancel();
}

/// Scenario 4: capture + resend. A one-shot snapshot of a `Multi`'s cached
/// value is replayed to a newly bound sink before that sink sees any later
/// live value.
#[test]
fn capture_resend_replays_before_any_live_value() {
    let multi = Multi::<i32>::new(Arc::new(InlineExec::new()), Arc::new(NoopUpstream), MultiPolicy::Continuous);
    let keepalive = subscribe_values::<i32>(
        Arc::new(InlineExec::new()),
        {
            let multi = multi.clone();
            move |sink| {
                let subscription = MultiSubscription::new(multi.clone(), sink);
                subscription.activate();
                subscription
            }
        },
        |_| {},
    );
    let input = Input::new(multi.clone());
    input.send(7).unwrap();

    let capture = Capture::new(multi.clone());
    assert_eq!(capture.current_value(), Some(&7));

    let seen: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_handler = seen.clone();
    let lifetime = subscribe_values::<i32>(Arc::new(InlineExec::new()), move |sink| {
        capture.bind(sink, true).unwrap();
        Arc::new(NoopUpstream)
    }, move |v| seen_handler.lock().unwrap().push(v));

    assert_eq!(*seen.lock().unwrap(), vec![7]);
    input.send(8).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![7, 8]);

    lifetime.cancel();
    keepalive.cancel();
}

/// Scenario 5: retry with delay. A source that fails once then succeeds
/// is retried after the configured delay, with the error never reaching
/// the subscriber.
#[test]
fn retry_recovers_after_delay_without_surfacing_the_error() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let clock = Arc::new(MockClock::new());
    let exec = Arc::new(InlineExec::with_clock(clock.clone()));

    let seen: Arc<Mutex<Vec<Item<i32>>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_handler = seen.clone();
    let attempt = Arc::new(AtomicUsize::new(0));

    let lifetime = subscribe::<i32>(
        exec.clone(),
        move |sink| {
            let make_source = {
                let attempt = attempt.clone();
                move |port: Arc<dyn GatedSink<i32>>| -> Arc<dyn Activatable> {
                    struct FlakyOnce {
                        attempt: Arc<AtomicUsize>,
                        port: Arc<dyn GatedSink<i32>>,
                    }
                    impl Activatable for FlakyOnce {
                        fn activate(&self) {
                            let n = self.attempt.fetch_add(1, Ordering::SeqCst);
                            let count = self.port.activation();
                            if n == 0 {
                                self.port.deliver(Item::End(EndReason::Other(CoreError::new("net"))), count);
                            } else {
                                self.port.deliver(Item::Value(99), count);
                                self.port.deliver(Item::End(EndReason::Complete), count);
                            }
                        }
                        fn deactivate(&self) {}
                    }
                    Arc::new(FlakyOnce { attempt: attempt.clone(), port })
                }
            };
            Retry::new(exec.clone(), Next::new(sink), 1, Duration::from_millis(10), make_source)
        },
        move |item| seen_handler.lock().unwrap().push(item),
    );

    assert!(seen.lock().unwrap().is_empty());
    clock.advance(Duration::from_millis(10));

    let seen = seen.lock().unwrap();
    assert!(matches!(seen[0], Item::Value(99)));
    assert!(matches!(seen[1], Item::End(EndReason::Complete)));
    assert_eq!(seen.len(), 2);

    lifetime.cancel();
}

/// Scenario 6: cancel idempotence. Cancelling a subscription twice never
/// panics and never redelivers `End`.
#[test]
fn cancel_is_idempotent_and_never_redelivers_end() {
    let ends = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let ends_handler = ends.clone();
    let lifetime = subscribe::<i32>(
        Arc::new(InlineExec::new()),
        |sink| Preclosed::new(vec![1, 2], EndReason::Complete, Next::new(sink)),
        move |item| {
            if item.is_end() {
                ends_handler.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        },
    );
    lifetime.cancel();
    lifetime.cancel();
    lifetime.cancel();
    assert_eq!(ends.load(std::sync::atomic::Ordering::SeqCst), 1);
}
