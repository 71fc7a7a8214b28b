//! A curated, shallow-path import surface — this crate's public operations
//! collected into one `use conduit_core::prelude::*;`.
//!
//! # 设计背景（Why）
//! Re-exports the stable call-site surface so downstream code doesn't need
//! to reach into `conduit_core::node::junction::Junction` and similar
//! internal paths directly.

pub use crate::activation::{ActivationCount, ActivationValues, MultiPolicy};
pub use crate::error::{BindError, CoreError, SendError};
pub use crate::exec::{ExecContext, InlineExec, ThreadExec};
pub use crate::item::{EndReason, Item};
pub use crate::time::{Clock, MockClock, SystemClock, TimerHandle};

pub use crate::node::combine::{
    Combine2, Combine3, Combine4, Combine5, Either2, Either3, Either4, Either5,
};
pub use crate::node::input::Input;
pub use crate::node::interval::{Interval, Timer};
pub use crate::node::junction::{Capture, Junction, Reconnector};
pub use crate::node::merged_input::{ClosePropagation, MergedInput};
pub use crate::node::multi::{Multi, MultiSubscription};
pub use crate::node::polling::{peek, SignalLatest};
pub use crate::node::producer::{Generator, GeneratorInput, Preclosed};
pub use crate::node::subscriber::{subscribe, subscribe_values, subscribe_while, Lifetime, Subscriber};
pub use crate::node::transform::Transform;
pub use crate::node::{Activatable, GatedSink, Next, Sink};

pub use crate::operators::retry::Retry;
pub use crate::operators::zip::{zip, zip_complete_on_either_end};
