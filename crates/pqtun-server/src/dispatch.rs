//! Per-connection dispatch: responder handshake, target decode, policy
//! checks, dial, and handing off to the matching relay engine.

use std::sync::Arc;
use std::time::Duration;

use pqtun_proto::auth::SignatureVerifier;
use pqtun_proto::response::ResponseCode;
use pqtun_proto::target::Target;
use pqtun_proto::handshake;
use pqtun_relay::{relay_datagram, relay_stream, RelayConfig, Reporter};
use pqtun_transport::AeadStream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::dial::{dial_tcp, dial_udp};
use crate::policy::ProtocolPolicy;

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("handshake failed: {0}")]
    Handshake(#[from] pqtun_proto::HandshakeError),
    #[error("transport error: {0}")]
    Transport(#[from] pqtun_transport::TransportError),
    #[error("relay error: {0}")]
    Relay(#[from] pqtun_relay::RelayError),
}

/// Runs one accepted connection end to end. Errors are already logged by
/// the time this returns; the caller only needs to drop the connection.
pub async fn handle_connection<T>(
    mut transport: T,
    remote: std::net::SocketAddr,
    config: &ServerConfig,
    verifier: Arc<dyn SignatureVerifier>,
    policy: Arc<dyn ProtocolPolicy>,
    reporter: Option<Arc<dyn Reporter>>,
    cancel: CancellationToken,
) -> Result<(), DispatchError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let session = match handshake::server::run(&mut transport, &config.handshake, verifier.as_ref()).await {
        Ok(session) => session,
        Err(e) => {
            warn!(%remote, error = %e, "handshake failed");
            return Err(e.into());
        }
    };
    info!(%remote, client_id = %String::from_utf8_lossy(&session.client_id), "handshake complete");

    let mut aead = AeadStream::new(transport, *session.key());

    // A target request is always sent as exactly one frame, so a single
    // `read` call returns the whole record.
    let mut buf = vec![0u8; pqtun_proto::target::MAX_TARGET_SIZE];
    let n = match aead.read(&mut buf, config.target_request_deadline).await {
        Ok(n) => n,
        Err(e) => {
            warn!(%remote, error = %e, "failed to read target request");
            return Err(e.into());
        }
    };

    let target = match Target::unpack(&buf[..n]) {
        Ok(t) => t,
        Err(_) => {
            let _ = aead.write_all(&[ResponseCode::MalformedRequest.as_byte()], config.target_request_deadline).await;
            return Ok(());
        }
    };

    if !policy.allows(&session.client_id, &target.net) {
        let _ = aead.write_all(&[ResponseCode::InvalidProtocol.as_byte()], config.target_request_deadline).await;
        return Ok(());
    }

    let connect_timeout = Duration::from_secs(target.c_to_b as u64);
    let relay_cfg = RelayConfig {
        r_to_a: Duration::from_secs(target.r_to_a as u64),
        w_to_a: Duration::from_secs(target.w_to_a as u64),
        r_to_b: Duration::from_secs(target.r_to_b as u64),
        w_to_b: Duration::from_secs(target.w_to_b as u64),
    };

    match target.net.as_str() {
        "tcp" => match dial_tcp(&target.host, target.port, connect_timeout).await {
            Ok(upstream) => {
                aead.write_all(&[ResponseCode::ConnOpened.as_byte()], config.target_request_deadline)
                    .await?;
                relay_stream(aead, upstream, relay_cfg, reporter, cancel).await?;
                Ok(())
            }
            Err(e) => {
                let _ = aead.write_all(&[e.response_code().as_byte()], config.target_request_deadline).await;
                Ok(())
            }
        },
        "udp" => match dial_udp(&target.host, target.port, connect_timeout).await {
            Ok(upstream) => {
                aead.write_all(&[ResponseCode::ConnOpened.as_byte()], config.target_request_deadline)
                    .await?;
                relay_datagram(aead, upstream, relay_cfg, reporter, cancel).await?;
                Ok(())
            }
            Err(e) => {
                let _ = aead.write_all(&[e.response_code().as_byte()], config.target_request_deadline).await;
                Ok(())
            }
        },
        _ => {
            let _ = aead.write_all(&[ResponseCode::InvalidProtocol.as_byte()], config.target_request_deadline).await;
            Ok(())
        }
    }
}
