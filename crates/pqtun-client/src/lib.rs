//! The client dialer: connects to a server, runs the initiator handshake,
//! wraps the channel in AEAD, negotiates a target, and hands back a relay
//! channel on success.

use std::collections::HashMap;
use std::time::Duration;

use pqtun_proto::response::ResponseCode;
use pqtun_proto::target::Target;
use pqtun_proto::{handshake, HandshakeConfig};
use pqtun_transport::AeadStream;
use tokio::net::{TcpStream, ToSocketAddrs};

#[derive(thiserror::Error, Debug)]
pub enum DialError {
    #[error("failed to connect to server: {0}")]
    Connect(#[from] std::io::Error),
    #[error("handshake failed: {0}")]
    Handshake(#[from] pqtun_proto::HandshakeError),
    #[error("failed to send target request: {0}")]
    Transport(#[from] pqtun_transport::TransportError),
    #[error("server rejected the request: {0:?}")]
    Rejected(ResponseCode),
    #[error("server returned an unrecognised response byte: {0}")]
    UnrecognisedResponse(u8),
}

#[derive(Debug)]
pub struct DialedChannel {
    pub stream: AeadStream<TcpStream>,
}

/// Connects to `server_addr`, authenticates as `client_id` (signing the
/// server's challenge with `sign`), and requests `target`. On `CONN_OPENED`
/// returns the AEAD-wrapped channel ready for relay; any other response
/// byte is a typed, terminal failure.
pub async fn dial(
    server_addr: impl ToSocketAddrs,
    handshake_cfg: &HandshakeConfig,
    client_id: &[u8],
    metadata: HashMap<String, String>,
    sign: impl FnOnce(&[u8]) -> Vec<u8>,
    target: &Target,
    response_deadline: Duration,
) -> Result<DialedChannel, DialError> {
    let mut transport = TcpStream::connect(server_addr).await?;

    let session = handshake::client::run(&mut transport, handshake_cfg, client_id, metadata, sign).await?;

    let mut aead = AeadStream::new(transport, *session.key());

    let packed = target
        .pack()
        .expect("caller-constructed targets must respect the documented field-length limits");
    aead.write_all(&packed, response_deadline).await?;

    let mut response_byte = [0u8; 1];
    let n = aead.read(&mut response_byte, response_deadline).await?;
    if n == 0 {
        return Err(DialError::UnrecognisedResponse(0));
    }

    match ResponseCode::from_byte(response_byte[0]) {
        Some(ResponseCode::ConnOpened) => Ok(DialedChannel { stream: aead }),
        Some(code) => Err(DialError::Rejected(code)),
        None => Err(DialError::UnrecognisedResponse(response_byte[0])),
    }
}
