//! Collaborator traits for the delivery pipeline
//!
//! The pipeline only ever talks to the outside world through these seams:
//! a scan source it asks for results, a transport it hands one message at a
//! time, and an ack sink the transport reports readiness through.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::types::RawNetwork;

/// Source of discovered networks.
#[async_trait]
pub trait ScanSource: Send + Sync {
    /// Run one scan and return everything it saw.
    async fn scan(&self) -> Result<Vec<RawNetwork>>;

    /// Called once before the first scan request.
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Called once when the pipeline shuts down.
    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Source name/identifier
    fn name(&self) -> &str;
}

/// Receives readiness signals emitted by a transport.
pub trait AckSink: Send + Sync {
    /// The far end is ready for the next message.
    fn ack(&self);
}

/// Single-slot message transport.
///
/// `send` is fire-and-forget: success only means the message was handed
/// off. Readiness for the next message arrives later through the
/// [`AckSink`] the transport was built with.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand one encoded message to the far end.
    async fn send(&self, message: Bytes) -> Result<()>;

    /// Start the companion app on the far end.
    async fn launch_companion(&self, _app: Uuid) -> Result<()> {
        Ok(())
    }

    /// Stop the companion app on the far end.
    async fn close_companion(&self, _app: Uuid) -> Result<()> {
        Ok(())
    }

    /// Whether the far end is reachable right now.
    fn is_connected(&self) -> bool {
        true
    }

    /// Transport name/identifier
    fn name(&self) -> &str;
}
