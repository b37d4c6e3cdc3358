// crates/receiver/src/server.rs
//! Far-end receiver server
//!
//! Speaks the framed protocol from `detective-codec`: every app message is
//! answered with a single ACK or NACK byte, launch and close frames get no
//! reply.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use detective_codec::{decode_record, read_frame, Frame, ACK, NACK};
use detective_common::{WireRecord, DEFAULT_COMPANION_APP};

use crate::board::{BoardEntry, BoardView, NetworkBoard};

/// Things a display loop may want to react to.
#[derive(Debug, Clone)]
pub enum BoardEvent {
    /// A new open network; the watch double-pulses here.
    Alert(BoardEntry),
    /// A Cleanup arrived, so the previous batch is complete.
    BatchComplete(BoardView),
    Launched,
    Closed,
}

/// Applies incoming frames to a shared [`NetworkBoard`].
#[derive(Clone)]
pub struct ReceiverServer {
    board: Arc<Mutex<NetworkBoard>>,
    app: Uuid,
    events: Option<mpsc::UnboundedSender<BoardEvent>>,
}

impl ReceiverServer {
    pub fn new(board: Arc<Mutex<NetworkBoard>>) -> Self {
        Self {
            board,
            app: DEFAULT_COMPANION_APP,
            events: None,
        }
    }

    /// Only launch/close frames for `app` are honoured.
    #[must_use]
    pub fn with_app(mut self, app: Uuid) -> Self {
        self.app = app;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<BoardEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn board(&self) -> Arc<Mutex<NetworkBoard>> {
        self.board.clone()
    }

    /// Accept connections one at a time, forever.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(
            "Receiver listening on {}",
            listener.local_addr().context("Listener has no local address")?
        );
        loop {
            let (stream, peer) = listener.accept().await.context("Accept failed")?;
            info!("Phone connected from {}", peer);
            match self.handle_connection(stream).await {
                Ok(()) => info!("Phone {} disconnected", peer),
                Err(e) => warn!("Connection from {} ended: {:#}", peer, e),
            }
        }
    }

    /// Process frames until EOF.
    pub async fn handle_connection<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);

        while let Some(frame) = read_frame(&mut reader).await? {
            match frame {
                Frame::AppMessage(message) => {
                    let reply = self.on_message(&message);
                    writer.write_all(&[reply]).await?;
                    writer.flush().await?;
                }
                Frame::Launch(app) => {
                    self.on_launch(app);
                }
                Frame::Close(app) => {
                    self.on_close(app);
                }
            }
        }
        Ok(())
    }

    /// Start the companion if `app` is ours. Returns whether it was.
    pub fn on_launch(&self, app: Uuid) -> bool {
        if app != self.app {
            warn!("Ignoring launch for unknown app {}", app);
            return false;
        }
        self.board.lock().launch();
        self.emit(BoardEvent::Launched);
        true
    }

    pub fn on_close(&self, app: Uuid) -> bool {
        if app != self.app {
            warn!("Ignoring close for unknown app {}", app);
            return false;
        }
        self.board.lock().close();
        self.emit(BoardEvent::Closed);
        true
    }

    /// Apply one encoded message. Returns the reply byte.
    pub fn on_message(&self, message: &[u8]) -> u8 {
        let record = match decode_record(message) {
            Ok(record) => record,
            Err(e) => {
                warn!("Undecodable message ({} bytes): {}", message.len(), e);
                return NACK;
            }
        };

        let mut board = self.board.lock();
        if !board.is_running() {
            debug!("Companion not running, rejecting {}", record);
            return NACK;
        }

        if matches!(record, WireRecord::Cleanup) && !board.is_empty() {
            self.emit(BoardEvent::BatchComplete(board.view()));
        }
        if let Some(entry) = board.apply(&record) {
            info!("New open network: {} ({})", entry.ssid, entry.bssid);
            self.emit(BoardEvent::Alert(entry));
        }
        ACK
    }

    fn emit(&self, event: BoardEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detective_codec::{encode_record, write_frame};
    use detective_common::NetworkRecord;
    use tokio::io::AsyncReadExt;

    fn open(ssid: &str) -> WireRecord {
        WireRecord::Network(NetworkRecord {
            is_encrypted: false,
            signal_quality: 40,
            ssid: ssid.to_string(),
            bssid: "bb:bb:bb:bb:bb:bb".to_string(),
            should_alert: true,
        })
    }

    fn server() -> (ReceiverServer, mpsc::UnboundedReceiver<BoardEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let server = ReceiverServer::new(Arc::new(Mutex::new(NetworkBoard::new()))).with_events(tx);
        (server, rx)
    }

    #[test]
    fn test_nack_when_not_running() {
        let (server, _rx) = server();
        let message = encode_record(&WireRecord::Cleanup).unwrap();
        assert_eq!(server.on_message(&message), NACK);
    }

    #[test]
    fn test_nack_on_garbage() {
        let (server, _rx) = server();
        server.board().lock().launch();
        assert_eq!(server.on_message(&[0xff, 0x00]), NACK);
    }

    #[test]
    fn test_batch_complete_on_cleanup() {
        let (server, mut rx) = server();
        server.board().lock().launch();

        for record in [WireRecord::Cleanup, open("Open"), WireRecord::Cleanup] {
            let message = encode_record(&record).unwrap();
            assert_eq!(server.on_message(&message), ACK);
        }

        assert!(matches!(rx.try_recv(), Ok(BoardEvent::Alert(e)) if e.ssid == "Open"));
        match rx.try_recv() {
            Ok(BoardEvent::BatchComplete(view)) => assert_eq!(view.public.len(), 1),
            other => panic!("expected batch complete, got {:?}", other),
        }
        assert!(server.board().lock().is_empty());
    }

    #[tokio::test]
    async fn test_connection_round_trip() {
        let (server, mut rx) = server();
        let (mut phone, watch) = tokio::io::duplex(1024);

        let task = {
            let server = server.clone();
            tokio::spawn(async move { server.handle_connection(watch).await })
        };

        write_frame(&mut phone, &Frame::Launch(DEFAULT_COMPANION_APP)).await.unwrap();
        for record in [WireRecord::Cleanup, open("Open")] {
            let message = encode_record(&record).unwrap();
            write_frame(&mut phone, &Frame::AppMessage(message)).await.unwrap();
            let mut reply = [0u8; 1];
            phone.read_exact(&mut reply).await.unwrap();
            assert_eq!(reply[0], ACK);
        }
        write_frame(&mut phone, &Frame::Close(DEFAULT_COMPANION_APP)).await.unwrap();
        drop(phone);

        task.await.unwrap().unwrap();
        assert!(matches!(rx.recv().await, Some(BoardEvent::Launched)));
        assert!(matches!(rx.recv().await, Some(BoardEvent::Alert(_))));
        assert!(matches!(rx.recv().await, Some(BoardEvent::Closed)));

        let board = server.board();
        let board = board.lock();
        assert!(!board.is_running());
        assert_eq!(board.alerts(), 1);
    }

    #[tokio::test]
    async fn test_unknown_app_ignored() {
        let (server, _rx) = server();
        let (mut phone, watch) = tokio::io::duplex(256);
        write_frame(&mut phone, &Frame::Launch(Uuid::new_v4())).await.unwrap();
        drop(phone);

        server.handle_connection(watch).await.unwrap();
        assert!(!server.board().lock().is_running());
    }
}
