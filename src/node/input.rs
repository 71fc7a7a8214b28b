//! `Input<T>`: the imperative-send handle used by external producers and by
//! each input registered with a [`crate::node::merged_input::MergedInput`].

use std::sync::Arc;

use super::GatedSink;
use crate::error::SendError;
use crate::item::{EndReason, Item};

/// A handle that pushes values into whatever [`GatedSink`] it targets.
///
/// # 契约说明（What）
/// `send`/`end` never block and never panic on a disconnected or inactive
/// target — they report [`SendError`] instead, matching the external
/// interface imperative producers need.
#[derive(Clone)]
pub struct Input<T> {
    target: Arc<dyn GatedSink<T>>,
}

impl<T> Input<T> {
    pub fn new(target: Arc<dyn GatedSink<T>>) -> Self {
        Self { target }
    }

    pub fn send(&self, value: T) -> Result<(), SendError> {
        self.check()?;
        self.target.deliver(Item::Value(value), self.target.activation());
        Ok(())
    }

    pub fn end(&self, reason: EndReason) -> Result<(), SendError> {
        self.check()?;
        self.target.deliver(Item::End(reason), self.target.activation());
        Ok(())
    }

    fn check(&self) -> Result<(), SendError> {
        if !self.target.is_connected() {
            return Err(SendError::Disconnected);
        }
        if !self.target.is_active() {
            return Err(SendError::Inactive);
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.target.is_active()
    }
}
