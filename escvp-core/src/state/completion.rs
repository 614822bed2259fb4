//! Single-resolution completion handle with any number of waiters.
//!
//! Backed by a `tokio::sync::watch` slot that starts empty. The first
//! `resolve` / `reject` fills it; every later attempt is a no-op.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{EscvpError, Result};
use crate::property::PropertyValue;

type Outcome = Option<Result<PropertyValue>>;

/// Cloneable handle; all clones observe the same outcome.
#[derive(Debug, Clone)]
pub struct Completion {
    slot: Arc<watch::Sender<Outcome>>,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
        }
    }

    /// Complete with a value. Returns `false` if already completed.
    pub fn resolve(&self, value: PropertyValue) -> bool {
        self.complete(Ok(value))
    }

    /// Complete with an error. Returns `false` if already completed.
    pub fn reject(&self, error: EscvpError) -> bool {
        self.complete(Err(error))
    }

    fn complete(&self, outcome: Result<PropertyValue>) -> bool {
        let mut outcome = Some(outcome);
        self.slot.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = outcome.take();
            true
        })
    }

    pub fn is_done(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// The outcome, if already completed.
    pub fn peek(&self) -> Option<Result<PropertyValue>> {
        self.slot.borrow().clone()
    }

    /// Wait for the outcome.
    pub async fn wait(&self) -> Result<PropertyValue> {
        let mut rx = self.slot.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or(Err(EscvpError::ConnectionClosed)),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => Err(EscvpError::ConnectionClosed),
        }
    }

    /// Identity comparison: `true` when both handles share one slot.
    pub fn same_as(&self, other: &Completion) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}
