//! Bidirectional byte-stream relay between the AEAD-wrapped client channel
//! `A` and the freshly dialed upstream `B`. Two cooperating directions run
//! concurrently; the first to end (clean EOF or error) closes both
//! endpoints and unblocks the other.

use std::sync::Arc;
use std::time::Duration;

use pqtun_transport::{AeadReadHalf, AeadWriteHalf, AeadStream, TransportError};
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;

use crate::report::{Op, Reporter, Side};

const BUF_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Per-direction timeouts; `Duration::ZERO` means "no deadline".
    pub r_to_a: Duration,
    pub w_to_a: Duration,
    pub r_to_b: Duration,
    pub w_to_b: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("upstream transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("relay cancelled")]
    Cancelled,
}

/// Runs the relay to completion. Returns `Ok(())` if both directions ended
/// with clean EOF, or the first non-EOF error observed on either side.
pub async fn relay_stream<T, B>(
    a: AeadStream<T>,
    b: B,
    cfg: RelayConfig,
    reporter: Option<Arc<dyn Reporter>>,
    cancel: CancellationToken,
) -> Result<(), RelayError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ar, mut aw) = a.split();
    let (mut br, mut bw): (ReadHalf<B>, WriteHalf<B>) = split(b);

    let a_to_b = copy_a_to_b(&mut ar, &mut bw, &cfg, reporter.clone());
    let b_to_a = copy_b_to_a(&mut br, &mut aw, &cfg, reporter.clone());

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RelayError::Cancelled),
        res = a_to_b => res,
        res = b_to_a => res,
    };

    let _ = aw.shutdown().await;
    let _ = bw.shutdown().await;

    result
}

async fn copy_a_to_b<R, W>(
    a: &mut AeadReadHalf<R>,
    b: &mut W,
    cfg: &RelayConfig,
    reporter: Option<Arc<dyn Reporter>>,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = a.read(&mut buf, cfg.r_to_a).await?;
        if n == 0 {
            return Ok(());
        }
        if let Some(r) = &reporter {
            r.report(Side::A, Op::Read, n);
        }

        write_with_deadline(b, &buf[..n], cfg.w_to_b).await?;
        if let Some(r) = &reporter {
            r.report(Side::B, Op::Write, n);
        }
    }
}

async fn copy_b_to_a<R, W>(
    b: &mut R,
    a: &mut AeadWriteHalf<W>,
    cfg: &RelayConfig,
    reporter: Option<Arc<dyn Reporter>>,
) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = read_with_deadline(b, &mut buf, cfg.r_to_b).await?;
        if n == 0 {
            return Ok(());
        }
        if let Some(r) = &reporter {
            r.report(Side::B, Op::Read, n);
        }

        a.write_all(&buf[..n], cfg.w_to_a).await?;
        if let Some(r) = &reporter {
            r.report(Side::A, Op::Write, n);
        }
    }
}

async fn read_with_deadline<R: AsyncRead + Unpin>(
    r: &mut R,
    buf: &mut [u8],
    deadline: Duration,
) -> std::io::Result<usize> {
    use tokio::io::AsyncReadExt;
    if deadline.is_zero() {
        r.read(buf).await
    } else {
        tokio::time::timeout(deadline, r.read(buf))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "read deadline exceeded"))?
    }
}

async fn write_with_deadline<W: AsyncWrite + Unpin>(
    w: &mut W,
    buf: &[u8],
    deadline: Duration,
) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    if deadline.is_zero() {
        w.write_all(buf).await
    } else {
        tokio::time::timeout(deadline, w.write_all(buf))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "write deadline exceeded"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingReporter {
        reads: AtomicUsize,
        writes: AtomicUsize,
    }

    impl Reporter for CountingReporter {
        fn report(&self, _side: Side, op: Op, n: usize) {
            match op {
                Op::Read => self.reads.fetch_add(n, Ordering::SeqCst),
                Op::Write => self.writes.fetch_add(n, Ordering::SeqCst),
            };
        }
    }

    #[tokio::test]
    async fn relays_bytes_both_directions_until_clean_eof() {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let a = AeadStream::new(server_side, [1u8; 32]);
        let mut client = AeadStream::new(client_side, [1u8; 32]);

        let (upstream_near, upstream_far) = tokio::io::duplex(64 * 1024);

        let cfg = RelayConfig {
            r_to_a: Duration::ZERO,
            w_to_a: Duration::ZERO,
            r_to_b: Duration::ZERO,
            w_to_b: Duration::ZERO,
        };
        let reporter = Arc::new(CountingReporter {
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        });

        let relay_task = tokio::spawn(relay_stream(
            a,
            upstream_near,
            cfg,
            Some(reporter.clone() as Arc<dyn Reporter>),
            CancellationToken::new(),
        ));

        client.write_all(b"ping", Duration::from_secs(1)).await.unwrap();

        let mut upstream_far = upstream_far;
        let mut echo_buf = [0u8; 4];
        use tokio::io::{AsyncReadExt, AsyncWriteExt as _};
        upstream_far.read_exact(&mut echo_buf).await.unwrap();
        assert_eq!(&echo_buf, b"ping");
        upstream_far.write_all(b"pong").await.unwrap();
        upstream_far.shutdown().await.unwrap();

        let mut reply = [0u8; 4];
        let n = client.read(&mut reply, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&reply[..n], b"pong");

        drop(client);
        let result = relay_task.await.unwrap();
        assert!(result.is_ok());
        assert!(reporter.reads.load(Ordering::SeqCst) > 0);
        assert!(reporter.writes.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn cancellation_stops_the_relay() {
        let (_client_side, server_side) = tokio::io::duplex(4096);
        let a = AeadStream::new(server_side, [2u8; 32]);
        let (upstream_near, _upstream_far) = tokio::io::duplex(4096);

        let cfg = RelayConfig {
            r_to_a: Duration::ZERO,
            w_to_a: Duration::ZERO,
            r_to_b: Duration::ZERO,
            w_to_b: Duration::ZERO,
        };

        let cancel = CancellationToken::new();
        let relay_task = tokio::spawn(relay_stream(a, upstream_near, cfg, None, cancel.clone()));
        cancel.cancel();

        let result = relay_task.await.unwrap();
        assert!(matches!(result, Err(RelayError::Cancelled)));
    }
}
