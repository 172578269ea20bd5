//! Length-prefixed, deadline-bounded I/O helpers shared by both handshake roles.
//!
//! Every step of the handshake reads or writes a single message under a
//! caller-supplied deadline; the deadline is always cleared before returning
//! so a later step starts with a clean slate.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

#[derive(thiserror::Error, Debug)]
pub enum WireError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Read exactly `buf.len()` bytes, or fail if `deadline` elapses first.
pub async fn read_exact_deadline<T: AsyncRead + Unpin>(
    transport: &mut T,
    buf: &mut [u8],
    deadline: Duration,
) -> Result<(), WireError> {
    timeout(deadline, transport.read_exact(buf))
        .await
        .map_err(|_| WireError::Timeout(deadline))??;
    Ok(())
}

/// Read up to `buf.len()` bytes (a short read is not an error), bounded by `deadline`.
/// Returns the number of bytes read.
pub async fn read_some_deadline<T: AsyncRead + Unpin>(
    transport: &mut T,
    buf: &mut [u8],
    deadline: Duration,
) -> Result<usize, WireError> {
    let n = timeout(deadline, transport.read(buf))
        .await
        .map_err(|_| WireError::Timeout(deadline))??;
    Ok(n)
}

/// Write the whole buffer and flush, bounded by `deadline`.
pub async fn write_all_deadline<T: AsyncWrite + Unpin>(
    transport: &mut T,
    buf: &[u8],
    deadline: Duration,
) -> Result<(), WireError> {
    timeout(deadline, async {
        transport.write_all(buf).await?;
        transport.flush().await
    })
    .await
    .map_err(|_| WireError::Timeout(deadline))??;
    Ok(())
}

/// Read a 16-bit big-endian length prefix, then that many bytes, bounded by `deadline`.
pub async fn read_u16_prefixed_deadline<T: AsyncRead + Unpin>(
    transport: &mut T,
    deadline: Duration,
) -> Result<Vec<u8>, WireError> {
    let mut lenb = [0u8; 2];
    read_exact_deadline(transport, &mut lenb, deadline).await?;
    let len = u16::from_be_bytes(lenb) as usize;
    let mut buf = vec![0u8; len];
    read_exact_deadline(transport, &mut buf, deadline).await?;
    Ok(buf)
}

/// Write a 16-bit big-endian length prefix followed by `payload`, bounded by `deadline`.
pub async fn write_u16_prefixed_deadline<T: AsyncWrite + Unpin>(
    transport: &mut T,
    payload: &[u8],
    deadline: Duration,
) -> Result<(), WireError> {
    let len: u16 = payload
        .len()
        .try_into()
        .map_err(|_| WireError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "payload too large for u16 prefix")))?;
    let mut framed = Vec::with_capacity(2 + payload.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(payload);
    write_all_deadline(transport, &framed, deadline).await
}
