//! Contract: `Lifetime::cancel` is idempotent and non-blocking, and never
//! redelivers `End` — including when the stream had already ended on its
//! own before `cancel` was ever called.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use conduit_core::prelude::*;

#[test]
fn cancel_after_natural_completion_does_not_redeliver_end() {
    super::init_tracing();
    let ends = Arc::new(AtomicUsize::new(0));
    let ends_handler = ends.clone();

    let lifetime = subscribe::<i32>(
        Arc::new(InlineExec::new()),
        |sink| Preclosed::new(vec![10, 20, 30], EndReason::Complete, Next::new(sink)),
        move |item| {
            if item.is_end() {
                ends_handler.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    // The stream already ran to completion synchronously inside
    // `subscribe`; cancelling afterward must be a pure no-op.
    assert_eq!(ends.load(Ordering::SeqCst), 1);
    lifetime.cancel();
    lifetime.cancel();
    assert_eq!(ends.load(Ordering::SeqCst), 1);
    assert!(lifetime.is_cancelled());
}

#[test]
fn cancel_before_any_value_still_delivers_exactly_one_end() {
    let ends = Arc::new(AtomicUsize::new(0));
    let ends_handler = ends.clone();

    struct NoopUpstream;
    impl Activatable for NoopUpstream {
        fn activate(&self) {}
        fn deactivate(&self) {}
    }

    let lifetime = subscribe::<i32>(
        Arc::new(InlineExec::new()),
        |_sink| Arc::new(NoopUpstream),
        move |item| {
            if item.is_end() {
                ends_handler.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    lifetime.cancel();
    lifetime.cancel();
    lifetime.cancel();
    assert_eq!(ends.load(Ordering::SeqCst), 1);
}
