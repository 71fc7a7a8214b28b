//! Time abstraction backing `Interval`/`Timer` producers and the `retry`
//! operator's delay.

mod clock;

pub use clock::{Clock, MockClock, SystemClock, TimerHandle};
