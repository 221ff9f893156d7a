//! Length-prefixed message frames over an ordered byte stream.
//!
//! Each frame is a `u32` little-endian payload length followed by the
//! bincode-encoded [`Message`]. TCP keeps frames in order per connection;
//! there is no ordering across connections, which the protocol tolerates by
//! sending full snapshots.
//!
//! Error taxonomy, matching the per-connection handling rules: a payload that
//! fails to decode is reported as [`ErrorKind::InvalidData`] with the stream
//! left aligned on the next frame, so callers can log it and keep reading. A
//! length prefix above [`MAX_FRAME_LEN`] means the stream can no longer be
//! trusted and is reported as [`ErrorKind::InvalidInput`]; callers should
//! drop the connection.

use crate::protocol::Message;
use std::io::{self, ErrorKind};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame's payload. A full board update is a few
/// hundred bytes; anything near this limit is garbage or abuse.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Writes one framed message and flushes the stream.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = bincode::serialize(message)
        .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "outgoing frame exceeds maximum length",
        ));
    }

    writer.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await
}

/// Reads one framed message.
///
/// `UnexpectedEof` on the length prefix is the normal end of a connection.
pub async fn read_message<R>(reader: &mut R) -> io::Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("frame length {} exceeds maximum", len),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    bincode::deserialize(&payload).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
}
