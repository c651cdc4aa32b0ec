//! Length-delimited framing: a 4-byte big-endian length prefix followed by
//! a `bincode`-encoded [`Message`]. Mirrors the teacher's line-length cap
//! on its `JsonReceiver` base class, ported to a binary framing for a
//! bincode payload instead of newline-delimited JSON.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{NetworkError, Result};
use crate::message::Message;

/// No single frame may exceed this many bytes. Guards against a
/// misbehaving or malicious peer claiming an unbounded length prefix.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Encode `msg` as a length-prefixed frame.
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>> {
    let body = bincode::serialize(msg).map_err(|e| NetworkError::Encode(e.to_string()))?;
    let len: u32 = body
        .len()
        .try_into()
        .map_err(|_| NetworkError::FrameTooLarge { len: u32::MAX, max: MAX_FRAME_LEN })?;
    if len > MAX_FRAME_LEN {
        return Err(NetworkError::FrameTooLarge { len, max: MAX_FRAME_LEN });
    }
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Write one frame to `writer`, flushing after.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, msg: &Message) -> Result<()> {
    let frame = encode_frame(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame from `reader`, or `Err(NetworkError::ConnectionClosed)` on
/// clean EOF before any bytes of the next frame arrive.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(NetworkError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(NetworkError::FrameTooLarge { len, max: MAX_FRAME_LEN });
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    bincode::deserialize(&body).map_err(|e| NetworkError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_a_duplex_pipe() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let msg = Message::Dummy;
        write_frame(&mut client, &msg).await.unwrap();
        let decoded = read_frame(&mut server).await.unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client.write_all(&(MAX_FRAME_LEN + 1).to_be_bytes()).await.unwrap();
        let result = read_frame(&mut server).await;
        assert!(matches!(result, Err(NetworkError::FrameTooLarge { .. })));
    }
}
