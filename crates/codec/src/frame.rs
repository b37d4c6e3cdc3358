//! Stream framing between the phone side and the far end
//!
//! Frame: `u8` kind, `u16` little-endian payload length, payload.
//! The far end answers each app message with a single status byte.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::CodecError;

/// Status byte: message accepted, ready for the next one.
pub const ACK: u8 = 0x06;
/// Status byte: message rejected.
pub const NACK: u8 = 0x15;

/// Largest payload a frame may carry.
pub const MAX_FRAME_PAYLOAD: usize = 1024;

const FRAME_HEADER_LEN: usize = 3;

/// Frame kind constants
pub mod frame_kind {
    pub const APP_MESSAGE: u8 = 1;
    pub const LAUNCH: u8 = 2;
    pub const CLOSE: u8 = 3;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Encoded dictionary for the companion app.
    AppMessage(Bytes),
    /// Start the companion app with this id.
    Launch(Uuid),
    /// Stop the companion app with this id.
    Close(Uuid),
}

impl Frame {
    pub fn kind(&self) -> u8 {
        match self {
            Frame::AppMessage(_) => frame_kind::APP_MESSAGE,
            Frame::Launch(_) => frame_kind::LAUNCH,
            Frame::Close(_) => frame_kind::CLOSE,
        }
    }

    /// Serialize header + payload.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let payload: &[u8] = match self {
            Frame::AppMessage(msg) => &msg[..],
            Frame::Launch(app) | Frame::Close(app) => &app.as_bytes()[..],
        };
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(CodecError::FrameTooLarge {
                len: payload.len(),
                max: MAX_FRAME_PAYLOAD,
            });
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
        buf.put_u8(self.kind());
        buf.put_u16_le(payload.len() as u16);
        buf.put_slice(payload);
        Ok(buf.freeze())
    }

    fn from_parts(kind: u8, payload: Vec<u8>) -> Result<Self, CodecError> {
        match kind {
            frame_kind::APP_MESSAGE => Ok(Frame::AppMessage(Bytes::from(payload))),
            frame_kind::LAUNCH | frame_kind::CLOSE => {
                let app = Uuid::from_slice(&payload).map_err(|_| CodecError::Truncated {
                    needed: 16,
                    available: payload.len(),
                })?;
                Ok(if kind == frame_kind::LAUNCH {
                    Frame::Launch(app)
                } else {
                    Frame::Close(app)
                })
            }
            other => Err(CodecError::UnknownFrame(other)),
        }
    }
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = frame.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. Returns `Ok(None)` on a clean EOF between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let kind = header[0];
    let len = u16::from_le_bytes([header[1], header[2]]) as usize;
    if len > MAX_FRAME_PAYLOAD {
        return Err(CodecError::FrameTooLarge {
            len,
            max: MAX_FRAME_PAYLOAD,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Frame::from_parts(kind, payload).map(Some)
}
