//! The AEAD-framed channel the client and server speak once the handshake
//! completes. No plaintext crosses the wire past this point: every `read`
//! opens one sealed frame, every `write` seals one.
//!
//! This intentionally does not implement `tokio::io::{AsyncRead, AsyncWrite}`
//! directly — callers (the target-request exchange, the relay engine) drive
//! it with explicit per-call deadlines, matching how every other step of the
//! protocol is deadline-bounded.

use std::collections::VecDeque;
use std::time::Duration;

use pqtun_proto::aead::{AeadError, AeadKey};
use pqtun_proto::wire::{read_u16_prefixed_deadline, write_u16_prefixed_deadline, WireError};
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Aead(#[from] AeadError),
}

impl TransportError {
    /// True when the peer simply closed the connection rather than
    /// misbehaving — the stream-relay engine treats this as clean EOF.
    pub fn is_clean_eof(&self) -> bool {
        matches!(
            self,
            TransportError::Wire(WireError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof
        )
    }
}

/// An AEAD-sealed duplex built on top of any `AsyncRead + AsyncWrite`
/// transport, keyed by the 32-byte secret the handshake derived.
pub struct AeadStream<T> {
    inner: T,
    aead: AeadKey,
    read_buf: VecDeque<u8>,
}

impl<T> std::fmt::Debug for AeadStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadStream").finish_non_exhaustive()
    }
}

impl<T> AeadStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(inner: T, key: [u8; 32]) -> Self {
        Self {
            inner,
            aead: AeadKey::new(&key),
            read_buf: VecDeque::new(),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Reads up to `buf.len()` decrypted bytes, pulling and opening a new
    /// frame from the wire if the internal buffer is empty. Returns `Ok(0)`
    /// only on clean remote close.
    pub async fn read(&mut self, buf: &mut [u8], deadline: Duration) -> Result<usize, TransportError> {
        if self.read_buf.is_empty() {
            let sealed = match read_u16_prefixed_deadline(&mut self.inner, deadline).await {
                Ok(sealed) => sealed,
                Err(e) if matches!(&e, WireError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof) => {
                    return Ok(0);
                }
                Err(e) => return Err(e.into()),
            };
            let plaintext = self.aead.open(&sealed)?;
            self.read_buf.extend(plaintext);
        }

        let n = buf.len().min(self.read_buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.read_buf.pop_front().expect("checked non-empty above");
        }
        Ok(n)
    }

    /// Seals `buf` as a single frame and writes it whole.
    pub async fn write_all(&mut self, buf: &[u8], deadline: Duration) -> Result<(), TransportError> {
        let sealed = self.aead.seal(buf);
        write_u16_prefixed_deadline(&mut self.inner, &sealed, deadline).await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.inner.shutdown().await
    }

    /// Splits into independent read/write halves so the two relay
    /// directions can each own one side without contending for `&mut self`.
    pub fn split(self) -> (AeadReadHalf<ReadHalf<T>>, AeadWriteHalf<WriteHalf<T>>) {
        let (r, w) = split(self.inner);
        (
            AeadReadHalf {
                inner: r,
                aead: self.aead.clone(),
                read_buf: self.read_buf,
            },
            AeadWriteHalf {
                inner: w,
                aead: self.aead,
            },
        )
    }
}

pub struct AeadReadHalf<R> {
    inner: R,
    aead: AeadKey,
    read_buf: VecDeque<u8>,
}

impl<R: AsyncRead + Unpin> AeadReadHalf<R> {
    pub async fn read(&mut self, buf: &mut [u8], deadline: Duration) -> Result<usize, TransportError> {
        if self.read_buf.is_empty() {
            let sealed = match read_u16_prefixed_deadline(&mut self.inner, deadline).await {
                Ok(sealed) => sealed,
                Err(e) if matches!(&e, WireError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof) => {
                    return Ok(0);
                }
                Err(e) => return Err(e.into()),
            };
            let plaintext = self.aead.open(&sealed)?;
            self.read_buf.extend(plaintext);
        }

        let n = buf.len().min(self.read_buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.read_buf.pop_front().expect("checked non-empty above");
        }
        Ok(n)
    }
}

pub struct AeadWriteHalf<W> {
    inner: W,
    aead: AeadKey,
}

impl<W: AsyncWrite + Unpin> AeadWriteHalf<W> {
    pub async fn write_all(&mut self, buf: &[u8], deadline: Duration) -> Result<(), TransportError> {
        let sealed = self.aead.seal(buf);
        write_u16_prefixed_deadline(&mut self.inner, &sealed, deadline).await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.inner.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips_across_buffer_boundaries() {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let mut a = AeadStream::new(a, [5u8; 32]);
        let mut b = AeadStream::new(b, [5u8; 32]);

        a.write_all(b"hello, upstream", Duration::from_secs(1)).await.unwrap();

        let mut small = [0u8; 4];
        let n = b.read(&mut small, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&small[..n], b"hell");

        let mut rest = [0u8; 32];
        let n = b.read(&mut rest, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&rest[..n], b"o, upstream");
    }

    #[tokio::test]
    async fn mismatched_keys_fail_to_open() {
        let (a, b) = tokio::io::duplex(4096);
        let mut a = AeadStream::new(a, [1u8; 32]);
        let mut b = AeadStream::new(b, [2u8; 32]);

        a.write_all(b"secret", Duration::from_secs(1)).await.unwrap();
        let mut buf = [0u8; 16];
        let err = b.read(&mut buf, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, TransportError::Aead(_)));
    }

    #[tokio::test]
    async fn closing_the_writer_reads_back_as_clean_eof() {
        let (a, b) = tokio::io::duplex(4096);
        drop(a);
        let mut b = AeadStream::new(b, [9u8; 32]);
        let mut buf = [0u8; 16];
        let n = b.read(&mut buf, Duration::from_secs(1)).await.unwrap();
        assert_eq!(n, 0);
    }
}
