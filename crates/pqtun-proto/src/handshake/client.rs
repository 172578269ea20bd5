//! Initiator side of the handshake. Initial state is `AWAIT_PUBKEY`.

use std::collections::HashMap;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::aead::AeadKey;
use crate::config::HandshakeConfig;
use crate::idmeta;
use crate::kem;
use crate::session::{HandshakeError, Session};
use crate::wire::{read_exact_deadline, write_all_deadline, write_u16_prefixed_deadline};

use super::{ACK_LEN, ACK_MAGIC};

/// Runs the full initiator handshake over `transport`, claiming `client_id`
/// and `metadata`, and signing the server's challenge with `sign`. `sign` is
/// the same HMAC-SHA-256-over-challenge computation the server's default
/// verifier performs, keyed by the caller's own copy of the password.
pub async fn run<T>(
    transport: &mut T,
    config: &HandshakeConfig,
    client_id: &[u8],
    metadata: HashMap<String, String>,
    sign: impl FnOnce(&[u8]) -> Vec<u8>,
) -> Result<Session, HandshakeError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    // Step 1: S -> C, raw public key. AWAIT_PUBKEY.
    let mut pk_bytes = vec![0u8; config.kem.public_key_len()];
    read_exact_deadline(transport, &mut pk_bytes, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to read public key", e))?;

    // Step 2: C -> S, raw ciphertext.
    let (ct, shared_secret) = kem::encapsulate(config.kem, &pk_bytes)
        .map_err(|e| HandshakeError::new("failed to encapsulate", e))?;
    write_all_deadline(transport, &ct, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to send ciphertext", e))?;
    let aead = AeadKey::new(&shared_secret);

    // Step 3: S -> C, ACK. Fixed size, no length prefix.
    let mut sealed_ack = vec![0u8; ACK_LEN + crate::aead::OVERHEAD];
    read_exact_deadline(transport, &mut sealed_ack, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to read ack", e))?;
    let ack = aead
        .open(&sealed_ack)
        .map_err(|e| HandshakeError::new("failed to open ack", e))?;
    if ack.len() < 4 || ack[..4] != ACK_MAGIC {
        return Err(HandshakeError::new(
            "unexpected ack magic",
            io::Error::new(io::ErrorKind::InvalidData, "ack mismatch"),
        ));
    }

    // Step 4: C -> S, ID + metadata record. A single write, no length prefix;
    // the server reads it back with one bounded non-full read.
    let plaintext_idmeta = idmeta::encode(client_id, &metadata);
    let sealed_idmeta = aead.seal(&plaintext_idmeta);
    write_all_deadline(transport, &sealed_idmeta, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to send id/metadata", e))?;

    // Step 5: S -> C, challenge. Fixed size, no length prefix.
    let mut sealed_challenge = vec![0u8; config.challenge_len() + crate::aead::OVERHEAD];
    read_exact_deadline(transport, &mut sealed_challenge, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to read challenge", e))?;
    let challenge = aead
        .open(&sealed_challenge)
        .map_err(|e| HandshakeError::new("failed to open challenge", e))?;

    // Step 6: C -> S, length-prefixed sealed signature.
    let signature = sign(&challenge);
    let sealed_sig = aead.seal(&signature);
    write_u16_prefixed_deadline(transport, &sealed_sig, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to send signature", e))?;

    // Step 7: S -> C, confirmation. Same fixed size as the step 5 challenge,
    // since it reseals the same plaintext.
    let mut sealed_confirmation = vec![0u8; config.challenge_len() + crate::aead::OVERHEAD];
    read_exact_deadline(transport, &mut sealed_confirmation, config.step_deadline)
        .await
        .map_err(|e| HandshakeError::new("failed to read confirmation", e))?;
    let confirmation = aead
        .open(&sealed_confirmation)
        .map_err(|e| HandshakeError::new("failed to open confirmation", e))?;
    if confirmation != challenge {
        return Err(HandshakeError::new(
            "confirmation does not match challenge",
            io::Error::new(io::ErrorKind::InvalidData, "confirmation mismatch"),
        ));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&*shared_secret);
    Ok(Session::new(client_id.to_vec(), metadata, key, std::time::SystemTime::now()))
}
