//! Alert delivery port.
//!
//! Transports (chat bots, webhooks) live outside the core; this trait is
//! the seam. Transport errors are values on the receipt, never panics, and
//! are retriable by a later pipeline run.

use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::types::AlertEvent;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Result of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub delivered: bool,
    /// Transport error detail when not delivered; retriable.
    pub transport_error: Option<String>,
}

impl SendReceipt {
    pub fn delivered() -> Self {
        Self {
            delivered: true,
            transport_error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            transport_error: Some(error.into()),
        }
    }
}

/// Outbound alert delivery port.
pub trait AlertSink: Send + Sync {
    fn send(&self, event: &AlertEvent) -> BoxFuture<'_, SendReceipt>;
}

/// Test sink that records delivered events and can be made to fail.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<AlertEvent>>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with the given transport error.
    pub fn fail_with(&self, error: &str) {
        *self.fail_with.lock() = Some(error.to_string());
    }

    /// Restore successful delivery.
    pub fn recover(&self) {
        *self.fail_with.lock() = None;
    }

    pub fn delivered(&self) -> Vec<AlertEvent> {
        self.delivered.lock().clone()
    }
}

impl AlertSink for RecordingSink {
    fn send(&self, event: &AlertEvent) -> BoxFuture<'_, SendReceipt> {
        let event = event.clone();
        Box::pin(async move {
            if let Some(error) = self.fail_with.lock().clone() {
                warn!(symbol = %event.symbol, error = %error, "alert delivery failed");
                return SendReceipt::failed(error);
            }
            self.delivered.lock().push(event);
            SendReceipt::delivered()
        })
    }
}
