//! Challenge/response authentication: HMAC-SHA-256 over the challenge, keyed
//! by a password looked up from the client's claimed identity.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Looks up the shared secret for a claimed client identity. Implementations
/// must be safe to call concurrently from many connection tasks.
pub trait PasswordLookup: Send + Sync {
    fn lookup(&self, client_id: &[u8]) -> Option<Vec<u8>>;
}

/// Computes the expected signature, given `(session-so-far, challenge,
/// decrypted-signature)`. A false result or an error fails the session.
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        client_id: &[u8],
        metadata: &HashMap<String, String>,
        challenge: &[u8],
        signature: &[u8],
    ) -> bool;
}

pub fn sign(password: &[u8], challenge: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(password).expect("HMAC accepts keys of any length");
    mac.update(challenge);
    mac.finalize().into_bytes().to_vec()
}

fn verify_raw(password: &[u8], challenge: &[u8], signature: &[u8]) -> bool {
    let mut mac = HmacSha256::new_from_slice(password).expect("HMAC accepts keys of any length");
    mac.update(challenge);
    mac.verify_slice(signature).is_ok()
}

/// The default [`SignatureVerifier`]: HMAC-SHA-256 over the challenge, keyed
/// by whatever [`PasswordLookup`] returns for the claimed identity. An
/// unknown identity fails closed.
pub struct HmacVerifier<L: PasswordLookup> {
    lookup: L,
}

impl<L: PasswordLookup> HmacVerifier<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }
}

impl<L: PasswordLookup> SignatureVerifier for HmacVerifier<L> {
    fn verify(
        &self,
        client_id: &[u8],
        _metadata: &HashMap<String, String>,
        challenge: &[u8],
        signature: &[u8],
    ) -> bool {
        match self.lookup.lookup(client_id) {
            Some(password) => verify_raw(&password, challenge, signature),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticLookup(&'static str);
    impl PasswordLookup for StaticLookup {
        fn lookup(&self, _client_id: &[u8]) -> Option<Vec<u8>> {
            Some(self.0.as_bytes().to_vec())
        }
    }

    struct NoSuchUser;
    impl PasswordLookup for NoSuchUser {
        fn lookup(&self, _client_id: &[u8]) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn sign_and_verify_agree() {
        let challenge = b"0123456789012345678901234567890123456789";
        let sig = sign(b"password", challenge);
        assert!(verify_raw(b"password", challenge, &sig));
    }

    #[test]
    fn wrong_password_fails() {
        let challenge = b"challenge-bytes";
        let sig = sign(b"password", challenge);
        assert!(!verify_raw(b"wrong", challenge, &sig));
    }

    #[test]
    fn tampered_signature_fails() {
        let challenge = b"challenge-bytes";
        let mut sig = sign(b"password", challenge);
        sig[0] ^= 0xFF;
        assert!(!verify_raw(b"password", challenge, &sig));
    }

    #[test]
    fn hmac_verifier_delegates_to_lookup() {
        let verifier = HmacVerifier::new(StaticLookup("password"));
        let challenge = b"0123456789012345678901234567890123456789";
        let sig = sign(b"password", challenge);
        assert!(verifier.verify(b"alice", &HashMap::new(), challenge, &sig));
    }

    #[test]
    fn unknown_identity_fails_closed() {
        let verifier = HmacVerifier::new(NoSuchUser);
        let sig = sign(b"password", b"challenge");
        assert!(!verifier.verify(b"ghost", &HashMap::new(), b"challenge", &sig));
    }
}
