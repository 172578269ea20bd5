//! The accepting side of the tunnel: runs the responder handshake on every
//! connection, decodes the target request, enforces per-user policy, dials
//! the upstream, and hands off to the matching relay engine.

pub mod config;
pub mod dial;
pub mod dispatch;
pub mod policy;
pub mod server;

pub use config::ServerConfig;
pub use dial::DialError;
pub use dispatch::{handle_connection, DispatchError};
pub use policy::{AllowList, ProtocolPolicy};
pub use server::Server;
