//! The outcome of a completed (or failed) handshake.

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use zeroize::Zeroizing;

/// A human-readable reason paired with the underlying cause, carried by a
/// failed session. Mutually exclusive with a valid key: a `Session` is never
/// constructed with both a key and an error populated.
#[derive(Debug)]
pub struct HandshakeError {
    pub reason: String,
    pub cause: Box<dyn std::error::Error + Send + Sync>,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.cause)
    }
}

impl std::error::Error for HandshakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

impl HandshakeError {
    pub fn new(reason: impl Into<String>, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            reason: reason.into(),
            cause: Box::new(cause),
        }
    }
}

/// A successfully authenticated handshake: the peer's claimed identity, any
/// metadata it sent, the 32-byte key derived for the AEAD channel, and the
/// wall-clock time the handshake completed.
///
/// The key is never transmitted and never logged; `Debug` deliberately omits
/// it.
pub struct Session {
    pub client_id: Vec<u8>,
    pub metadata: HashMap<String, String>,
    pub completed_at: SystemTime,
    key: Zeroizing<[u8; 32]>,
}

impl Session {
    pub fn new(
        client_id: Vec<u8>,
        metadata: HashMap<String, String>,
        key: [u8; 32],
        completed_at: SystemTime,
    ) -> Self {
        Self {
            client_id,
            metadata,
            completed_at,
            key: Zeroizing::new(key),
        }
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &String::from_utf8_lossy(&self.client_id))
            .field("metadata", &self.metadata)
            .field("completed_at", &self.completed_at)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_key_bytes() {
        let key = [0xABu8; 32];
        let session = Session::new(b"client-1".to_vec(), HashMap::new(), key, SystemTime::now());
        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("171"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn handshake_error_displays_reason_and_cause() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline exceeded");
        let err = HandshakeError::new("step 5 timed out", io_err);
        let rendered = err.to_string();
        assert!(rendered.contains("step 5 timed out"));
        assert!(rendered.contains("deadline exceeded"));
    }
}
