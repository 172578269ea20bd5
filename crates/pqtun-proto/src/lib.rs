//! Wire formats, cryptographic primitives, and the handshake state machine
//! shared by the server and client crates. Nothing here performs socket
//! I/O beyond the generic `AsyncRead + AsyncWrite` transport the handshake
//! and wire helpers are written against.

pub mod aead;
pub mod auth;
pub mod config;
pub mod handshake;
pub mod idmeta;
pub mod kem;
pub mod response;
pub mod session;
pub mod target;
pub mod wire;

pub use config::HandshakeConfig;
pub use response::ResponseCode;
pub use session::{HandshakeError, Session};
pub use target::{Target, TargetCodecError, MAX_TARGET_SIZE};
