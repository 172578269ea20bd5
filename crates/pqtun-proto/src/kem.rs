//! ML-KEM key encapsulation, dispatched over the two supported security
//! levels. Wire sizes are fixed per level and checked against what PQClean
//! actually produces, since the protocol has no room for a length prefix on
//! steps 1 and 2.

use pqcrypto_mlkem::{mlkem1024, mlkem768};
use pqcrypto_traits::kem::{Ciphertext as _, PublicKey as _, SharedSecret as _};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KemKind {
    K768,
    K1024,
}

impl KemKind {
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            768 => Some(KemKind::K768),
            1024 => Some(KemKind::K1024),
            _ => None,
        }
    }

    pub fn public_key_len(self) -> usize {
        match self {
            KemKind::K768 => 1184,
            KemKind::K1024 => 1568,
        }
    }

    pub fn ciphertext_len(self) -> usize {
        match self {
            KemKind::K768 => 1088,
            KemKind::K1024 => 1568,
        }
    }
}

#[derive(Error, Debug)]
pub enum KemError {
    #[error("public key has the wrong length: got {got}, expected {expected}")]
    BadPublicKeyLen { got: usize, expected: usize },
    #[error("ciphertext has the wrong length: got {got}, expected {expected}")]
    BadCiphertextLen { got: usize, expected: usize },
    #[error("malformed ML-KEM encoding")]
    Malformed,
}

pub enum SecretState {
    K768(mlkem768::SecretKey),
    K1024(mlkem1024::SecretKey),
}

/// Generates a fresh keypair for the requested level. Returns the raw public
/// key bytes to send over the wire and the secret key retained by the server.
pub fn keypair(kind: KemKind) -> (Vec<u8>, SecretState) {
    match kind {
        KemKind::K768 => {
            let (pk, sk) = mlkem768::keypair();
            (pk.as_bytes().to_vec(), SecretState::K768(sk))
        }
        KemKind::K1024 => {
            let (pk, sk) = mlkem1024::keypair();
            (pk.as_bytes().to_vec(), SecretState::K1024(sk))
        }
    }
}

/// Encapsulates against a received public key. Returns the ciphertext to
/// send back and the 32-byte shared secret.
pub fn encapsulate(kind: KemKind, pk_bytes: &[u8]) -> Result<(Vec<u8>, Zeroizing<[u8; 32]>), KemError> {
    if pk_bytes.len() != kind.public_key_len() {
        return Err(KemError::BadPublicKeyLen {
            got: pk_bytes.len(),
            expected: kind.public_key_len(),
        });
    }

    match kind {
        KemKind::K768 => {
            let pk = mlkem768::PublicKey::from_bytes(pk_bytes).map_err(|_| KemError::Malformed)?;
            let (ss, ct) = mlkem768::encapsulate(&pk);
            Ok((ct.as_bytes().to_vec(), to_secret_array(ss.as_bytes())))
        }
        KemKind::K1024 => {
            let pk = mlkem1024::PublicKey::from_bytes(pk_bytes).map_err(|_| KemError::Malformed)?;
            let (ss, ct) = mlkem1024::encapsulate(&pk);
            Ok((ct.as_bytes().to_vec(), to_secret_array(ss.as_bytes())))
        }
    }
}

/// Decapsulates a received ciphertext using the server's retained secret key.
pub fn decapsulate(secret: &SecretState, ct_bytes: &[u8]) -> Result<Zeroizing<[u8; 32]>, KemError> {
    match secret {
        SecretState::K768(sk) => {
            if ct_bytes.len() != KemKind::K768.ciphertext_len() {
                return Err(KemError::BadCiphertextLen {
                    got: ct_bytes.len(),
                    expected: KemKind::K768.ciphertext_len(),
                });
            }
            let ct = mlkem768::Ciphertext::from_bytes(ct_bytes).map_err(|_| KemError::Malformed)?;
            let ss = mlkem768::decapsulate(&ct, sk);
            Ok(to_secret_array(ss.as_bytes()))
        }
        SecretState::K1024(sk) => {
            if ct_bytes.len() != KemKind::K1024.ciphertext_len() {
                return Err(KemError::BadCiphertextLen {
                    got: ct_bytes.len(),
                    expected: KemKind::K1024.ciphertext_len(),
                });
            }
            let ct = mlkem1024::Ciphertext::from_bytes(ct_bytes).map_err(|_| KemError::Malformed)?;
            let ss = mlkem1024::decapsulate(&ct, sk);
            Ok(to_secret_array(ss.as_bytes()))
        }
    }
}

fn to_secret_array(bytes: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[..32]);
    Zeroizing::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k768_round_trip_shared_secret() {
        let (pk, sk) = keypair(KemKind::K768);
        assert_eq!(pk.len(), KemKind::K768.public_key_len());

        let (ct, ss_client) = encapsulate(KemKind::K768, &pk).unwrap();
        assert_eq!(ct.len(), KemKind::K768.ciphertext_len());

        let ss_server = decapsulate(&sk, &ct).unwrap();
        assert_eq!(*ss_client, *ss_server);
    }

    #[test]
    fn k1024_round_trip_shared_secret() {
        let (pk, sk) = keypair(KemKind::K1024);
        assert_eq!(pk.len(), KemKind::K1024.public_key_len());

        let (ct, ss_client) = encapsulate(KemKind::K1024, &pk).unwrap();
        assert_eq!(ct.len(), KemKind::K1024.ciphertext_len());

        let ss_server = decapsulate(&sk, &ct).unwrap();
        assert_eq!(*ss_client, *ss_server);
    }

    #[test]
    fn rejects_wrong_length_public_key() {
        let err = encapsulate(KemKind::K768, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, KemError::BadPublicKeyLen { .. }));
    }

    #[test]
    fn rejects_wrong_length_ciphertext() {
        let (_, sk) = keypair(KemKind::K768);
        let err = decapsulate(&sk, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, KemError::BadCiphertextLen { .. }));
    }

    #[test]
    fn from_bits_maps_known_levels_only() {
        assert_eq!(KemKind::from_bits(768), Some(KemKind::K768));
        assert_eq!(KemKind::from_bits(1024), Some(KemKind::K1024));
        assert_eq!(KemKind::from_bits(512), None);
    }
}
