// crates/transport/src/tcp.rs
//! TCP transport to a remote receiver

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use detective_codec::{Frame, ACK, NACK};
use detective_common::{AckSink, DetectiveError, Transport};

/// Frames go out on the write half; a reader task turns reply bytes into acks.
pub struct TcpTransport {
    peer: SocketAddr,
    writer: Mutex<OwnedWriteHalf>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl TcpTransport {
    /// Connect to a receiver; acks are reported to `acks`.
    pub async fn connect(addr: &str, connect_timeout: Duration, acks: Arc<dyn AckSink>) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .with_context(|| format!("Timed out connecting to {}", addr))?
            .with_context(|| format!("Failed to connect to {}", addr))?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        info!("Connected to receiver at {}", peer);

        let (read_half, write_half) = stream.into_split();
        let connected = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_replies(read_half, acks, connected.clone()));

        Ok(Self {
            peer,
            writer: Mutex::new(write_half),
            connected,
            reader,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    async fn write(&self, frame: Frame) -> Result<()> {
        if !self.is_connected() {
            return Err(DetectiveError::NotConnected(self.peer.to_string()).into());
        }
        // an unencodable frame is rejected before it touches the socket
        let bytes = frame.encode()?;
        let mut writer = self.writer.lock().await;
        let written = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            self.connected.store(false, Ordering::Relaxed);
            return Err(e).with_context(|| format!("Failed to write to {}", self.peer));
        }
        Ok(())
    }
}

/// One reply byte per app message: ACK resumes delivery, NACK is silence.
async fn read_replies(mut reader: OwnedReadHalf, acks: Arc<dyn AckSink>, connected: Arc<AtomicBool>) {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte).await {
            Ok(0) => {
                warn!("Receiver closed the connection");
                break;
            }
            Ok(_) => match byte[0] {
                ACK => {
                    debug!("ACK");
                    acks.ack();
                }
                NACK => warn!("Receiver rejected message (NACK)"),
                other => warn!("Unexpected reply byte 0x{:02x}", other),
            },
            Err(e) => {
                warn!("Read from receiver failed: {}", e);
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, message: Bytes) -> Result<()> {
        self.write(Frame::AppMessage(message)).await
    }

    async fn launch_companion(&self, app: Uuid) -> Result<()> {
        self.write(Frame::Launch(app)).await
    }

    async fn close_companion(&self, app: Uuid) -> Result<()> {
        self.write(Frame::Close(app)).await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn name(&self) -> &str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detective_codec::{encode_record, MAX_FRAME_PAYLOAD};
    use detective_common::{WireRecord, DEFAULT_COMPANION_APP};
    use detective_receiver::{NetworkBoard, ReceiverServer};
    use parking_lot::Mutex as SyncMutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl AckSink for Counter {
        fn ack(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_for(counter: &Counter, n: usize) {
        for _ in 0..100 {
            if counter.0.load(Ordering::SeqCst) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {} acks", n);
    }

    #[tokio::test]
    async fn test_acks_from_receiver() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let board = Arc::new(SyncMutex::new(NetworkBoard::new()));
        let server = ReceiverServer::new(board.clone());
        tokio::spawn(async move { server.serve(listener).await });

        let counter = Arc::new(Counter::default());
        let transport = TcpTransport::connect(&addr, Duration::from_secs(2), counter.clone())
            .await
            .unwrap();
        assert!(transport.is_connected());

        transport.launch_companion(DEFAULT_COMPANION_APP).await.unwrap();
        transport
            .send(encode_record(&WireRecord::Cleanup).unwrap())
            .await
            .unwrap();
        wait_for(&counter, 1).await;
        assert!(board.lock().is_running());
    }

    #[tokio::test]
    async fn test_nack_produces_no_ack() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = ReceiverServer::new(Arc::new(SyncMutex::new(NetworkBoard::new())));
        tokio::spawn(async move { server.serve(listener).await });

        let counter = Arc::new(Counter::default());
        let transport = TcpTransport::connect(&addr, Duration::from_secs(2), counter.clone())
            .await
            .unwrap();

        // companion never launched: receiver answers NACK, then ACK after launch
        transport
            .send(encode_record(&WireRecord::Cleanup).unwrap())
            .await
            .unwrap();
        transport.launch_companion(DEFAULT_COMPANION_APP).await.unwrap();
        transport
            .send(encode_record(&WireRecord::Cleanup).unwrap())
            .await
            .unwrap();
        wait_for(&counter, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oversized_message_keeps_link_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let board = Arc::new(SyncMutex::new(NetworkBoard::new()));
        let server = ReceiverServer::new(board.clone());
        tokio::spawn(async move { server.serve(listener).await });

        let counter = Arc::new(Counter::default());
        let transport = TcpTransport::connect(&addr, Duration::from_secs(2), counter.clone())
            .await
            .unwrap();

        let big = Bytes::from(vec![0u8; MAX_FRAME_PAYLOAD + 1]);
        assert!(transport.send(big).await.is_err());
        assert!(transport.is_connected());

        transport.launch_companion(DEFAULT_COMPANION_APP).await.unwrap();
        transport
            .send(encode_record(&WireRecord::Cleanup).unwrap())
            .await
            .unwrap();
        wait_for(&counter, 1).await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let counter: Arc<dyn AckSink> = Arc::new(Counter::default());
        assert!(TcpTransport::connect(&addr, Duration::from_secs(1), counter)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_disconnect_detected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let counter: Arc<dyn AckSink> = Arc::new(Counter::default());
        let transport = TcpTransport::connect(&addr, Duration::from_secs(1), counter)
            .await
            .unwrap();
        accept.await.unwrap();

        for _ in 0..100 {
            if !transport.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!transport.is_connected());
        assert!(transport.send(Bytes::from_static(&[0])).await.is_err());
    }
}
