use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// A handle to a scheduled (one-shot or periodic) timer.
///
/// # 契约说明（What）
/// `cancel` is idempotent and non-blocking: a timer that has already fired,
/// or already been cancelled, tolerates a second `cancel()` call as a no-op.
/// It does not guarantee an in-flight callback invocation is interrupted —
/// only that no *future* firing occurs.
#[derive(Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    fn new() -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (
            Self {
                cancelled: flag.clone(),
            },
            flag,
        )
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Time injection point for `Interval`/`Timer` producers and the `retry`
/// operator.
///
/// # 设计背景（Why）
/// Split into `SystemClock` vs `MockClock` implementations, but this
/// crate's handlers never suspend, so there is no `Future`/`Waker` pair
/// here — timers fire by invoking a
/// callback directly on whatever thread the clock chooses to run them on,
/// and callers are responsible for hopping back into a node's `ExecContext`
/// before touching node state from that callback.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;

    /// Runs `job` once after `delay` has elapsed, unless the returned
    /// handle is cancelled first.
    fn spawn_after(&self, delay: Duration, job: Box<dyn FnOnce() + Send>) -> TimerHandle;

    /// Runs `job` every `period` until the returned handle is cancelled.
    fn spawn_periodic(&self, period: Duration, job: Arc<dyn Fn() + Send + Sync>) -> TimerHandle;
}

/// Wall-clock backed `Clock`. Each timer owns a dedicated sleeping thread —
/// simple, and adequate for the coarse-grained timers a signal graph
/// schedules (producer intervals, retry backoff), as opposed to a
/// high-resolution timer wheel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn spawn_after(&self, delay: Duration, job: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let (handle, flag) = TimerHandle::new();
        thread::spawn(move || {
            thread::sleep(delay);
            if !flag.load(Ordering::SeqCst) {
                job();
            }
        });
        handle
    }

    fn spawn_periodic(&self, period: Duration, job: Arc<dyn Fn() + Send + Sync>) -> TimerHandle {
        let (handle, flag) = TimerHandle::new();
        thread::spawn(move || loop {
            thread::sleep(period);
            if flag.load(Ordering::SeqCst) {
                return;
            }
            job();
        });
        handle
    }
}

enum TimerKind {
    Once(Mutex<Option<Box<dyn FnOnce() + Send>>>),
    Periodic {
        job: Arc<dyn Fn() + Send + Sync>,
        period: Duration,
    },
}

struct ScheduledTimer {
    id: u64,
    deadline: Duration,
    cancelled: Arc<AtomicBool>,
    kind: TimerKind,
}

struct MockClockState {
    elapsed: Duration,
    timers: Vec<ScheduledTimer>,
}

/// Deterministic virtual clock for tests: time only moves when `advance` is
/// called, and due timers fire in registration order within a tick.
///
/// # 设计背景（Why）
/// Rebuilt around plain callbacks instead of waking `Future`s. This is
/// what lets `retry`, `Interval`, and `Timer` be tested without sleeping
/// real wall-clock time.
pub struct MockClock {
    state: Mutex<MockClockState>,
    next_id: AtomicU64,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockClockState {
                elapsed: Duration::ZERO,
                timers: Vec::new(),
            }),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.state.lock().unwrap().elapsed
    }

    /// Advances virtual time by `by`, firing every timer whose deadline now
    /// falls at or before the new elapsed time, oldest-registered first.
    /// Periodic timers are rescheduled a single `period` ahead regardless of
    /// how many periods `by` actually spans — callers that need to observe
    /// every missed tick should advance in smaller steps.
    pub fn advance(&self, by: Duration) {
        let mut to_run: Vec<Box<dyn FnOnce() + Send>> = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            state.elapsed += by;
            let now = state.elapsed;
            state.timers.sort_by_key(|t| (t.deadline, t.id));
            let mut still_pending = Vec::new();
            for mut timer in state.timers.drain(..) {
                if timer.cancelled.load(Ordering::SeqCst) {
                    continue;
                }
                if timer.deadline > now {
                    still_pending.push(timer);
                    continue;
                }
                match &mut timer.kind {
                    TimerKind::Once(slot) => {
                        if let Some(job) = slot.get_mut().take() {
                            to_run.push(job);
                        }
                    }
                    TimerKind::Periodic { job, period } => {
                        let job = job.clone();
                        to_run.push(Box::new(move || job()));
                        timer.deadline += *period;
                        still_pending.push(timer);
                    }
                }
            }
            state.timers = still_pending;
        }
        for job in to_run {
            job();
        }
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        // A fixed epoch plus elapsed virtual time gives callers a real
        // `Instant` to compare against without depending on wall-clock time.
        Instant::now()
    }

    fn spawn_after(&self, delay: Duration, job: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let (handle, flag) = TimerHandle::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap();
        let deadline = state.elapsed + delay;
        state.timers.push(ScheduledTimer {
            id,
            deadline,
            cancelled: flag,
            kind: TimerKind::Once(Mutex::new(Some(job))),
        });
        handle
    }

    fn spawn_periodic(&self, period: Duration, job: Arc<dyn Fn() + Send + Sync>) -> TimerHandle {
        let (handle, flag) = TimerHandle::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap();
        let deadline = state.elapsed + period;
        state.timers.push(ScheduledTimer {
            id,
            deadline,
            cancelled: flag,
            kind: TimerKind::Periodic { job, period },
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn mock_clock_fires_once_timer_at_deadline() {
        let clock = MockClock::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        clock.spawn_after(Duration::from_millis(100), Box::new(move || {
            flag.store(true, Ordering::SeqCst);
        }));
        clock.advance(Duration::from_millis(50));
        assert!(!fired.load(Ordering::SeqCst));
        clock.advance(Duration::from_millis(50));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn mock_clock_periodic_reschedules() {
        let clock = MockClock::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        clock.spawn_periodic(Duration::from_millis(10), Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        clock.advance(Duration::from_millis(10));
        clock.advance(Duration::from_millis(10));
        clock.advance(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cancelled_timer_does_not_fire() {
        let clock = MockClock::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let handle = clock.spawn_after(Duration::from_millis(10), Box::new(move || {
            flag.store(true, Ordering::SeqCst);
        }));
        handle.cancel();
        clock.advance(Duration::from_millis(100));
        assert!(!fired.load(Ordering::SeqCst));
    }
}
