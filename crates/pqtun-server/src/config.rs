//! Server-wide tunables: where to listen, how the handshake behaves, and the
//! deadline applied to reading the post-handshake target request.

use std::time::Duration;

use pqtun_proto::HandshakeConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub handshake: HandshakeConfig,
    pub target_request_deadline: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".to_string(),
            handshake: HandshakeConfig::default(),
            target_request_deadline: Duration::from_secs(5),
        }
    }
}
