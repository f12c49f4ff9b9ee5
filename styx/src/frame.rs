//! Whole-frame I/O shared by the two engines.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use styx_protocol::{Message, MessageType, ProtocolError, HEADER_SIZE, MAX_MESSAGE_SIZE};

use crate::Error;

// The smallest legal frame is a header plus a bare tag.
const MIN_FRAME_SIZE: u32 = HEADER_SIZE as u32 + 2;

/// Read and decode one frame.
///
/// Returns `Ok(None)` on a clean end of stream at a frame boundary.  An
/// unknown type byte fails before the body is read; the connection is
/// done for either way.
pub(crate) async fn read_message<R: AsyncRead + Unpin>(rd: &mut R) -> Result<Option<Message>, Error> {
    let mut hdr = [0u8; HEADER_SIZE];
    let n = rd.read(&mut hdr).await?;
    if n == 0 {
        return Ok(None);
    }
    if n < HEADER_SIZE {
        rd.read_exact(&mut hdr[n..]).await?;
    }
    let size = u32::from_le_bytes(hdr[0..4].try_into().unwrap());
    if !(MIN_FRAME_SIZE..=MAX_MESSAGE_SIZE).contains(&size) {
        return Err(ProtocolError::InvalidSize(size).into());
    }
    let mt = MessageType::from_u8(hdr[4]).ok_or(ProtocolError::UnknownMessageType(hdr[4]))?;
    let mut body = vec![0u8; size as usize - HEADER_SIZE];
    rd.read_exact(&mut body).await?;
    Ok(Some(Message::decode(mt, &body)?))
}

/// Write one already-encoded frame and push it to the transport.
///
/// Callers hold the connection's write lock across this, which is what
/// keeps frames from interleaving.
pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(wr: &mut W, frame: &[u8]) -> Result<(), Error> {
    wr.write_all(frame).await?;
    wr.flush().await?;
    Ok(())
}
