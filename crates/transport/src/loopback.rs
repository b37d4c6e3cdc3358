// crates/transport/src/loopback.rs
//! In-process transport: the receiver board lives in the same process

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use detective_codec::ACK;
use detective_common::{AckSink, Transport};
use detective_receiver::{NetworkBoard, ReceiverServer};

/// Applies each message to a local [`NetworkBoard`] and acks it from a
/// separate task, never from inside `send`.
pub struct LoopbackTransport {
    receiver: ReceiverServer,
    acks: Arc<dyn AckSink>,
    ack_delay: Duration,
}

impl LoopbackTransport {
    pub fn new(receiver: ReceiverServer, acks: Arc<dyn AckSink>) -> Self {
        Self {
            receiver,
            acks,
            ack_delay: Duration::ZERO,
        }
    }

    /// Simulated link latency before each ack.
    #[must_use]
    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = delay;
        self
    }

    pub fn board(&self) -> Arc<Mutex<NetworkBoard>> {
        self.receiver.board()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, message: Bytes) -> Result<()> {
        if self.receiver.on_message(&message) != ACK {
            warn!("Loopback receiver rejected message");
            return Ok(());
        }

        let acks = self.acks.clone();
        let delay = self.ack_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            acks.ack();
        });
        Ok(())
    }

    async fn launch_companion(&self, app: Uuid) -> Result<()> {
        if !self.receiver.on_launch(app) {
            anyhow::bail!("Loopback receiver does not host app {}", app);
        }
        Ok(())
    }

    async fn close_companion(&self, app: Uuid) -> Result<()> {
        if !self.receiver.on_close(app) {
            anyhow::bail!("Loopback receiver does not host app {}", app);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detective_codec::encode_record;
    use detective_common::{NetworkRecord, WireRecord, DEFAULT_COMPANION_APP};
    use detective_receiver::Section;
    use tokio::sync::mpsc;

    struct ChannelSink(mpsc::UnboundedSender<()>);

    impl AckSink for ChannelSink {
        fn ack(&self) {
            let _ = self.0.send(());
        }
    }

    fn loopback() -> (LoopbackTransport, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let receiver = ReceiverServer::new(Arc::new(Mutex::new(NetworkBoard::new())));
        (LoopbackTransport::new(receiver, Arc::new(ChannelSink(tx))), rx)
    }

    #[tokio::test]
    async fn test_apply_then_ack() {
        let (transport, mut acks) = loopback();
        transport.launch_companion(DEFAULT_COMPANION_APP).await.unwrap();

        let record = WireRecord::Network(NetworkRecord {
            is_encrypted: true,
            signal_quality: 80,
            ssid: "Cafe".to_string(),
            bssid: "aa:aa:aa:aa:aa:aa".to_string(),
            should_alert: false,
        });
        transport.send(encode_record(&record).unwrap()).await.unwrap();

        assert_eq!(acks.recv().await, Some(()));
        let board = transport.board();
        assert_eq!(board.lock().section(Section::Protected)[0].ssid, "Cafe");
    }

    #[tokio::test]
    async fn test_rejected_message_is_not_acked() {
        let (transport, mut acks) = loopback();
        // not launched
        transport
            .send(encode_record(&WireRecord::Cleanup).unwrap())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(acks.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_app() {
        let (transport, _acks) = loopback();
        assert!(transport.launch_companion(Uuid::new_v4()).await.is_err());
        assert!(!transport.board().lock().is_running());
    }
}
