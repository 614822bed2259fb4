//! Property change notification.
//!
//! Updates are produced by the read loop in arrival order and handed to
//! a dispatcher task, so a slow or panicking listener never stalls
//! response correlation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::property::PropertyValue;
use crate::task::TaskPool;

/// One `(property, value)` pair delivered to the listener.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyUpdate {
    pub property: String,
    pub value: PropertyValue,
}

impl PropertyUpdate {
    pub fn new(property: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            property: property.into(),
            value,
        }
    }
}

/// Receives every property update the client observes, including
/// unsolicited pushes and status events.
#[async_trait]
pub trait PropertyListener: Send + Sync + 'static {
    async fn notify(&self, property: &str, value: &PropertyValue);
}

/// Adapts a plain closure into a [`PropertyListener`].
pub struct FnListener<F>(pub F);

#[async_trait]
impl<F> PropertyListener for FnListener<F>
where
    F: Fn(&str, &PropertyValue) + Send + Sync + 'static,
{
    async fn notify(&self, property: &str, value: &PropertyValue) {
        (self.0)(property, value)
    }
}

/// Forwarding end of a running dispatcher. Dropping it ends the task.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<PropertyUpdate>,
}

impl Dispatcher {
    pub(crate) fn spawn(listener: Arc<dyn PropertyListener>, tasks: &TaskPool) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PropertyUpdate>();
        tasks.spawn("listener", async move {
            while let Some(update) = rx.recv().await {
                let property = update.property.clone();
                let listener = Arc::clone(&listener);
                trace!(%property, value = %update.value, "notifying listener");
                let call = tokio::spawn(async move {
                    listener.notify(&update.property, &update.value).await;
                });
                if let Err(e) = call.await {
                    warn!(%property, error = %e, "property listener failed");
                }
            }
        });
        Self { tx }
    }

    pub(crate) fn dispatch(&self, update: PropertyUpdate) {
        if self.tx.send(update).is_err() {
            warn!("listener dispatcher has stopped");
        }
    }
}
