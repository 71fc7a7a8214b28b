//! Operators built on top of the core node kinds rather than being core
//! themselves: timeouts are implemented via `Timer` + `Combine` rather than
//! as a primitive, and similarly for `zip`/`retry`.

pub mod retry;
pub mod zip;

pub use retry::Retry;
pub use zip::zip;
