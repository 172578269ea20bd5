//! AES-256-GCM sealing for discrete handshake messages and relayed bytes.
//! Every sealed message is `12 random nonce bytes ‖ ciphertext ‖ 16-byte tag`
//! — 28 bytes longer than its plaintext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand_core::{OsRng, RngCore};
use thiserror::Error;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const OVERHEAD: usize = NONCE_LEN + TAG_LEN;

#[derive(Error, Debug)]
pub enum AeadError {
    #[error("decryption or authentication failed")]
    OpenFailed,
    #[error("ciphertext shorter than the minimum nonce+tag overhead")]
    TooShort,
}

#[derive(Clone)]
pub struct AeadKey {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadKey").finish_non_exhaustive()
    }
}

impl AeadKey {
    pub fn new(key: &[u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // aes-gcm never fails to encrypt given a correctly sized key/nonce.
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .expect("AES-256-GCM encryption is infallible for valid inputs");

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        out
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, AeadError> {
        if sealed.len() < OVERHEAD {
            return Err(AeadError::TooShort);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| AeadError::OpenFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let key = AeadKey::new(&[7u8; 32]);
        let plaintext = b"step 5 challenge material............".to_vec();
        let sealed = key.seal(&plaintext);
        assert_eq!(sealed.len(), plaintext.len() + OVERHEAD);
        let opened = key.open(&sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn open_with_wrong_key_fails() {
        let key_a = AeadKey::new(&[1u8; 32]);
        let key_b = AeadKey::new(&[2u8; 32]);
        let sealed = key_a.seal(b"hello");
        assert!(key_b.open(&sealed).is_err());
    }

    #[test]
    fn single_byte_tamper_fails() {
        let key = AeadKey::new(&[9u8; 32]);
        let mut sealed = key.seal(b"the original challenge");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(key.open(&sealed).is_err());
    }

    #[test]
    fn too_short_is_rejected_without_panicking() {
        let key = AeadKey::new(&[3u8; 32]);
        assert!(matches!(key.open(&[0u8; 10]), Err(AeadError::TooShort)));
    }
}
