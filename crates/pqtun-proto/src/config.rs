//! Tunable parameters shared by both handshake roles. Every field has a
//! default matching the documented protocol defaults; callers override only
//! what they need to.

use std::time::Duration;

use crate::kem::KemKind;

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub kem: KemKind,
    /// Deadline applied to each individual I/O step; cleared on return.
    pub step_deadline: Duration,
    pub id_meta_min_size: usize,
    pub id_meta_max_size: usize,
    /// Bounds on the decrypted signature length (`encsize - 28`).
    pub signature_min_size: usize,
    pub signature_max_size: usize,
    /// Optional delay the server sleeps after a successful handshake, to
    /// make successful and failed attempts take comparable wall-clock time.
    pub anti_enumeration_delay: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            kem: KemKind::K768,
            step_deadline: Duration::from_secs(5),
            id_meta_min_size: 2,
            id_meta_max_size: 256,
            signature_min_size: 32,
            signature_max_size: 32,
            anti_enumeration_delay: Duration::ZERO,
        }
    }
}

impl HandshakeConfig {
    pub fn challenge_len(&self) -> usize {
        40
    }
}
