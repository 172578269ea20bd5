//! Dials the upstream named by a decoded target and classifies the outcome
//! into the wire response-code taxonomy.

use std::time::Duration;

use pqtun_proto::response::ResponseCode;
use tokio::net::{lookup_host, TcpStream, UdpSocket};

#[derive(thiserror::Error, Debug)]
pub enum DialError {
    #[error("name resolution failed: {0}")]
    ResolveFailed(std::io::Error),
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("connection refused: {0}")]
    ConnRefused(std::io::Error),
    #[error("connection reset: {0}")]
    ConnReset(std::io::Error),
    #[error("dial failed: {0}")]
    Other(std::io::Error),
}

impl DialError {
    pub fn response_code(&self) -> ResponseCode {
        match self {
            DialError::ResolveFailed(_) => ResponseCode::ResolveFailed,
            DialError::ConnectTimeout => ResponseCode::BConnectTimeout,
            DialError::ConnRefused(_) => ResponseCode::ConnRefused,
            DialError::ConnReset(_) => ResponseCode::ConnReset,
            DialError::Other(_) => ResponseCode::ConnErrored,
        }
    }
}

fn classify_connect_error(e: std::io::Error) -> DialError {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => DialError::ConnRefused(e),
        std::io::ErrorKind::ConnectionReset => DialError::ConnReset(e),
        std::io::ErrorKind::TimedOut => DialError::ConnectTimeout,
        _ => DialError::Other(e),
    }
}

pub async fn dial_tcp(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream, DialError> {
    let addr = format!("{host}:{port}");
    let resolved = lookup_host(&addr).await.map_err(DialError::ResolveFailed)?;

    let mut last_err: Option<DialError> = None;
    for candidate in resolved {
        let attempt = if connect_timeout.is_zero() {
            TcpStream::connect(candidate).await.map_err(classify_connect_error)
        } else {
            match tokio::time::timeout(connect_timeout, TcpStream::connect(candidate)).await {
                Ok(res) => res.map_err(classify_connect_error),
                Err(_) => Err(DialError::ConnectTimeout),
            }
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or(DialError::Other(std::io::Error::new(
        std::io::ErrorKind::Other,
        "no addresses resolved",
    ))))
}

pub async fn dial_udp(host: &str, port: u16, connect_timeout: Duration) -> Result<UdpSocket, DialError> {
    let addr = format!("{host}:{port}");
    let mut resolved = lookup_host(&addr).await.map_err(DialError::ResolveFailed)?;
    let target = resolved.next().ok_or_else(|| {
        DialError::ResolveFailed(std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved"))
    })?;

    let local_bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(local_bind).await.map_err(DialError::Other)?;

    let connect = socket.connect(target);
    if connect_timeout.is_zero() {
        connect.await.map_err(classify_connect_error)?;
    } else {
        match tokio::time::timeout(connect_timeout, connect).await {
            Ok(res) => res.map_err(classify_connect_error)?,
            Err(_) => return Err(DialError::ConnectTimeout),
        }
    }

    Ok(socket)
}
