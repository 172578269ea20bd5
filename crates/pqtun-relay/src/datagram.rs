//! Datagram relay: each iteration moves exactly one datagram. The upstream
//! `B` is a connected `UdpSocket` (bound locally, connected to the resolved
//! target), so only `send`/`recv` are needed — no `send_to`/`recv_from`
//! routing.

use std::sync::Arc;
use std::time::Duration;

use pqtun_transport::AeadStream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::report::{Op, Reporter, Side};
use crate::stream::RelayConfig;
use crate::RelayError;

/// Maximum UDP payload size (65535 minus the 8-byte UDP header).
pub const MAX_DATAGRAM_SIZE: usize = 65507;

pub async fn relay_datagram<T>(
    a: AeadStream<T>,
    b: UdpSocket,
    cfg: RelayConfig,
    reporter: Option<Arc<dyn Reporter>>,
    cancel: CancellationToken,
) -> Result<(), RelayError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ar, mut aw) = a.split();
    let b = Arc::new(b);
    let b_send = Arc::clone(&b);

    let a_to_b = async {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let n = ar.read(&mut buf, cfg.r_to_a).await?;
            if n == 0 {
                return Ok::<(), RelayError>(());
            }
            if let Some(r) = &reporter {
                r.report(Side::A, Op::Read, n);
            }
            send_with_deadline(&b_send, &buf[..n], cfg.w_to_b).await?;
            if let Some(r) = &reporter {
                r.report(Side::B, Op::Write, n);
            }
        }
    };

    let reporter2 = reporter.clone();
    let b_to_a = async {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let n = recv_with_deadline(&b, &mut buf, cfg.r_to_b).await?;
            if n == 0 {
                return Ok::<(), RelayError>(());
            }
            if let Some(r) = &reporter2 {
                r.report(Side::B, Op::Read, n);
            }
            aw.write_all(&buf[..n], cfg.w_to_a).await?;
            if let Some(r) = &reporter2 {
                r.report(Side::A, Op::Write, n);
            }
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RelayError::Cancelled),
        res = a_to_b => res,
        res = b_to_a => res,
    }
}

async fn send_with_deadline(sock: &UdpSocket, buf: &[u8], deadline: Duration) -> Result<(), RelayError> {
    let fut = sock.send(buf);
    if deadline.is_zero() {
        fut.await?;
    } else {
        tokio::time::timeout(deadline, fut)
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "datagram write deadline exceeded"))??;
    }
    Ok(())
}

async fn recv_with_deadline(sock: &UdpSocket, buf: &mut [u8], deadline: Duration) -> Result<usize, RelayError> {
    let fut = sock.recv(buf);
    let n = if deadline.is_zero() {
        fut.await?
    } else {
        tokio::time::timeout(deadline, fut)
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "datagram read deadline exceeded"))??
    };
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relays_one_datagram_each_direction() {
        let a_side = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b_side = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        a_side.connect(b_side.local_addr().unwrap()).await.unwrap();
        b_side.connect(a_side.local_addr().unwrap()).await.unwrap();

        // Model the client with a plain duplex, feeding the AEAD stream we
        // actually drive through the relay.
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let a = AeadStream::new(server_side, [4u8; 32]);
        let mut client = AeadStream::new(client_side, [4u8; 32]);

        let cfg = RelayConfig {
            r_to_a: Duration::from_secs(1),
            w_to_a: Duration::from_secs(1),
            r_to_b: Duration::from_secs(1),
            w_to_b: Duration::from_secs(1),
        };

        let relay_task = tokio::spawn(relay_datagram(a, a_side, cfg, None, CancellationToken::new()));

        client.write_all(b"dns query", Duration::from_secs(1)).await.unwrap();
        let mut buf = [0u8; 64];
        let n = b_side.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"dns query");

        b_side.send(b"dns answer").await.unwrap();
        let mut reply = [0u8; 64];
        let n = client.read(&mut reply, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&reply[..n], b"dns answer");

        relay_task.abort();
    }
}
