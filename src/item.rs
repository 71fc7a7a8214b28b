//! The wire data model: every edge in a signal graph carries [`Item<T>`]
//! messages, a value stream terminated by at most one [`EndReason`].

use crate::error::CoreError;

/// A single message flowing along an edge of the graph.
///
/// # 契约说明（What）
/// - A node that has delivered `End(_)` downstream must never deliver
///   anything else afterward — this is enforced by [`crate::node::gate::Gate`],
///   not by this type itself.
#[derive(Debug, Clone)]
pub enum Item<T> {
    /// A live value.
    Value(T),
    /// Stream termination. Terminal: no further `Item` follows it on the
    /// same edge.
    End(EndReason),
}

impl<T> Item<T> {
    pub fn value(value: T) -> Self {
        Item::Value(value)
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Item::Value(_))
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Item::End(_))
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Item::Value(v) => Some(v),
            Item::End(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Item::Value(v) => Some(v),
            Item::End(_) => None,
        }
    }

    /// Maps the value payload, leaving an `End` untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Item<U> {
        match self {
            Item::Value(v) => Item::Value(f(v)),
            Item::End(reason) => Item::End(reason),
        }
    }
}

/// Why a stream ended.
///
/// # 设计背景（Why）
/// `Complete` and `Cancelled` are the two expected terminations; `Other`
/// carries an operator- or user-supplied failure. Treating all three
/// uniformly as "the stream is over" (rather than giving errors a separate
/// channel) is what lets every downstream node use the same single-path
/// close-propagation logic regardless of why the stream stopped.
#[derive(Debug, Clone)]
pub enum EndReason {
    /// The producer ran out of values on its own terms.
    Complete,
    /// A downstream consumer released its subscription, or the graph was
    /// torn down, before the producer would otherwise have completed.
    Cancelled,
    /// A user handler or operator reported a failure.
    Other(CoreError),
}

impl EndReason {
    pub fn is_complete(&self) -> bool {
        matches!(self, EndReason::Complete)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EndReason::Cancelled)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EndReason::Other(_))
    }

    pub fn as_error(&self) -> Option<&CoreError> {
        match self {
            EndReason::Other(e) => Some(e),
            _ => None,
        }
    }
}
