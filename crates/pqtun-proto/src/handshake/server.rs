//! Responder side of the handshake. Initial state is `AWAIT_CIPHERTEXT`
//! (after sending the public key); terminal states are `SESSION_READY` or
//! `FAILED(reason, cause)`. No transition is retried.

use std::io;

use rand_core::{OsRng, RngCore};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::aead::AeadKey;
use crate::auth::SignatureVerifier;
use crate::config::HandshakeConfig;
use crate::idmeta;
use crate::kem;
use crate::session::{HandshakeError, Session};
use crate::wire::{
    read_exact_deadline, read_some_deadline, read_u16_prefixed_deadline, write_all_deadline,
};

use super::{ACK_LEN, ACK_MAGIC};

/// Runs the full responder handshake over `transport`. On success the
/// returned [`Session`] carries the derived key and the client's claimed
/// identity and metadata. `verifier` is invoked once, at step 6.
pub async fn run<T>(
    transport: &mut T,
    config: &HandshakeConfig,
    verifier: &dyn SignatureVerifier,
) -> Result<Session, HandshakeError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    // Step 1: S -> C, raw public key.
    let (pk_bytes, secret) = kem::keypair(config.kem);
    write_all_deadline(transport, &pk_bytes, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to send public key", e))?;

    // Step 2: C -> S, raw ciphertext. AWAIT_CIPHERTEXT.
    let mut ct = vec![0u8; config.kem.ciphertext_len()];
    read_exact_deadline(transport, &mut ct, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to read encapsulated ciphertext", e))?;
    let shared_secret = kem::decapsulate(&secret, &ct)
        .map_err(|e| HandshakeError::new("failed to decapsulate", e))?;
    let aead = AeadKey::new(&shared_secret);

    // Step 3: S -> C, ACK. Fixed size, no length prefix.
    let mut ack = Vec::with_capacity(ACK_LEN);
    ack.extend_from_slice(&ACK_MAGIC);
    let mut tail = [0u8; 6];
    OsRng.fill_bytes(&mut tail);
    ack.extend_from_slice(&tail);
    let sealed_ack = aead.seal(&ack);
    write_all_deadline(transport, &sealed_ack, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to send ack", e))?;

    // Step 4: C -> S, ID + metadata record. A single non-full read bounded
    // by the configured max size; no length prefix.
    let mut idmeta_buf = vec![0u8; config.id_meta_max_size + crate::aead::OVERHEAD];
    let n = read_some_deadline(transport, &mut idmeta_buf, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to read id/metadata", e))?;
    let plaintext_idmeta = aead
        .open(&idmeta_buf[..n])
        .map_err(|e| HandshakeError::new("failed to open id/metadata", e))?;
    if plaintext_idmeta.len() < config.id_meta_min_size || plaintext_idmeta.len() > config.id_meta_max_size {
        return Err(HandshakeError::new(
            "id/metadata size out of bounds",
            io::Error::new(io::ErrorKind::InvalidData, "size policy violation"),
        ));
    }
    let (client_id, metadata) = idmeta::decode(&plaintext_idmeta)
        .map_err(|e| HandshakeError::new("failed to decode id/metadata", e))?;

    // Step 5: S -> C, challenge. Fixed size, no length prefix.
    let challenge_len = config.challenge_len();
    let mut challenge = vec![0u8; challenge_len];
    OsRng.fill_bytes(&mut challenge);
    let sealed_challenge = aead.seal(&challenge);
    write_all_deadline(transport, &sealed_challenge, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to send challenge", e))?;

    // Step 6: C -> S, length-prefixed sealed signature.
    let sealed_sig = read_u16_prefixed_deadline(transport, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to read signature", e))?;
    let encsize = sealed_sig.len();
    let decsize = encsize.checked_sub(crate::aead::OVERHEAD).ok_or_else(|| {
        HandshakeError::new(
            "signature shorter than AEAD overhead",
            io::Error::new(io::ErrorKind::InvalidData, "size policy violation"),
        )
    })?;
    if decsize < config.signature_min_size || decsize > config.signature_max_size {
        return Err(HandshakeError::new(
            "signature size out of bounds",
            io::Error::new(io::ErrorKind::InvalidData, "size policy violation"),
        ));
    }
    let signature = aead
        .open(&sealed_sig)
        .map_err(|e| HandshakeError::new("failed to open signature", e))?;

    if !verifier.verify(&client_id, &metadata, &challenge, &signature) {
        return Err(HandshakeError::new(
            "signature verification failed",
            io::Error::new(io::ErrorKind::PermissionDenied, "bad credentials"),
        ));
    }

    // Step 7: S -> C, confirmation. Fixed size, no length prefix.
    let sealed_confirmation = aead.seal(&challenge);
    write_all_deadline(transport, &sealed_confirmation, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to send confirmation", e))?;

    if !config.anti_enumeration_delay.is_zero() {
        tokio::time::sleep(config.anti_enumeration_delay).await;
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&*shared_secret);
    Ok(Session::new(client_id, metadata, key, std::time::SystemTime::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{sign, PasswordLookup};
    use crate::handshake::client;
    use std::collections::HashMap;

    struct OneUser {
        id: &'static [u8],
        password: &'static [u8],
    }

    impl PasswordLookup for OneUser {
        fn lookup(&self, client_id: &[u8]) -> Option<Vec<u8>> {
            if client_id == self.id {
                Some(self.password.to_vec())
            } else {
                None
            }
        }
    }

    fn verifier() -> crate::auth::HmacVerifier<OneUser> {
        crate::auth::HmacVerifier::new(OneUser {
            id: b"alice",
            password: b"correct horse battery staple",
        })
    }

    #[tokio::test]
    async fn happy_path_yields_matching_keys() {
        let (mut c, mut s) = tokio::io::duplex(64 * 1024);
        let cfg = HandshakeConfig::default();
        let v = verifier();

        let client_cfg = cfg.clone();
        let client_task = tokio::spawn(async move {
            client::run(&mut c, &client_cfg, b"alice", HashMap::new(), |challenge| {
                sign(b"correct horse battery staple", challenge)
            })
            .await
        });

        let server_result = run(&mut s, &cfg, &v).await;
        let client_result = client_task.await.unwrap();

        let server_session = server_result.expect("server handshake should succeed");
        let client_session = client_result.expect("client handshake should succeed");
        assert_eq!(server_session.key(), client_session.key());
        assert_eq!(server_session.client_id, b"alice");
    }

    #[tokio::test]
    async fn wrong_password_fails_the_session() {
        let (mut c, mut s) = tokio::io::duplex(64 * 1024);
        let cfg = HandshakeConfig::default();
        let v = verifier();

        let client_cfg = cfg.clone();
        let client_task = tokio::spawn(async move {
            client::run(&mut c, &client_cfg, b"alice", HashMap::new(), |challenge| {
                sign(b"wrong password", challenge)
            })
            .await
        });

        let server_result = run(&mut s, &cfg, &v).await;
        let _ = client_task.await;
        assert!(server_result.is_err());
    }
}
