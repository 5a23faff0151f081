//! Device transport seam.
//!
//! The crate never talks to a broker directly; it hands markup and
//! interrupts to a [`DeviceTransport`] implementation owned by the host
//! application. The trait is object-safe so runners can hold it behind an
//! `Arc<dyn DeviceTransport>`.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Transport-level send failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("device {device_id} is not connected")]
    Offline { device_id: String },

    #[error("send rejected: {reason}")]
    Rejected { reason: String },
}

/// Outbound channel to a robot device.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Deliver a markup payload to the device.
    async fn send_markup(&self, device_id: &str, markup: &str) -> Result<(), TransportError>;

    /// Interrupt whatever the device is currently playing.
    async fn send_interrupt(&self, device_id: &str) -> Result<(), TransportError>;
}

/// Dry-run transport that logs outbound traffic instead of publishing it.
///
/// Used by the CLI for rehearsing sequences without a connected device.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl DeviceTransport for LogTransport {
    async fn send_markup(&self, device_id: &str, markup: &str) -> Result<(), TransportError> {
        info!(device_id, bytes = markup.len(), %markup, "markup out");
        Ok(())
    }

    async fn send_interrupt(&self, device_id: &str) -> Result<(), TransportError> {
        info!(device_id, "interrupt out");
        Ok(())
    }
}
