//! The seven-step authenticated key-exchange handshake. [`client`] drives the
//! initiator side, [`server`] drives the responder side; both share the
//! wire helpers in [`crate::wire`] and the AEAD primitive in [`crate::aead`].

pub mod client;
pub mod server;

const ACK_MAGIC: [u8; 4] = [0x00, 0x08, 0x00, 0x08];
/// `ACK_MAGIC` plus 6 random tail bytes — the whole plaintext of step 3.
const ACK_LEN: usize = 10;
