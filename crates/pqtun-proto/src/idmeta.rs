//! ID-and-metadata codec: the plaintext record sent in handshake step 4,
//! before AEAD sealing. Format: `u8 id_len ‖ id ‖ {u8 key_len ‖ key ‖ u16
//! value_len ‖ value}*`. The whole buffer must be consumed exactly.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("malformed id/metadata record")]
pub struct IdMetaCodecError;

pub fn encode(id: &[u8], meta: &HashMap<String, String>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + id.len());
    buf.push(id.len() as u8);
    buf.extend_from_slice(id);

    for (key, value) in meta {
        buf.push(key.len() as u8);
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
        buf.extend_from_slice(value.as_bytes());
    }

    buf
}

pub fn decode(buf: &[u8]) -> Result<(Vec<u8>, HashMap<String, String>), IdMetaCodecError> {
    if buf.len() < 1 {
        return Err(IdMetaCodecError);
    }

    let mut pos = 0usize;
    let id_len = take_u8(buf, &mut pos)? as usize;
    let id = take_bytes(buf, &mut pos, id_len)?.to_vec();

    let mut meta = HashMap::new();

    while pos < buf.len() {
        let key_len = take_u8(buf, &mut pos)? as usize;
        let key = take_bytes(buf, &mut pos, key_len)?;
        let key = String::from_utf8(key.to_vec()).map_err(|_| IdMetaCodecError)?;

        let val_len = take_u16(buf, &mut pos)? as usize;
        let value = take_bytes(buf, &mut pos, val_len)?;
        let value = String::from_utf8(value.to_vec()).map_err(|_| IdMetaCodecError)?;

        meta.insert(key, value);
    }

    if pos != buf.len() {
        return Err(IdMetaCodecError);
    }

    Ok((id, meta))
}

fn take_u8(buf: &[u8], pos: &mut usize) -> Result<u8, IdMetaCodecError> {
    let b = *buf.get(*pos).ok_or(IdMetaCodecError)?;
    *pos += 1;
    Ok(b)
}

fn take_u16(buf: &[u8], pos: &mut usize) -> Result<u16, IdMetaCodecError> {
    let end = pos.checked_add(2).ok_or(IdMetaCodecError)?;
    let b = buf.get(*pos..end).ok_or(IdMetaCodecError)?;
    *pos = end;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn take_bytes<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], IdMetaCodecError> {
    let end = pos.checked_add(len).ok_or(IdMetaCodecError)?;
    let slice = buf.get(*pos..end).ok_or(IdMetaCodecError)?;
    *pos = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_metadata() {
        let id = b"client-42".to_vec();
        let mut meta = HashMap::new();
        meta.insert("region".to_string(), "eu-west-1".to_string());
        meta.insert("v".to_string(), "3".to_string());

        let encoded = encode(&id, &meta);
        let (got_id, got_meta) = decode(&encoded).unwrap();

        assert_eq!(got_id, id);
        assert_eq!(got_meta, meta);
    }

    #[test]
    fn roundtrip_without_metadata() {
        let id = b"solo".to_vec();
        let meta = HashMap::new();
        let encoded = encode(&id, &meta);
        let (got_id, got_meta) = decode(&encoded).unwrap();
        assert_eq!(got_id, id);
        assert!(got_meta.is_empty());
    }

    #[test]
    fn truncated_record_is_malformed() {
        let id = b"x".to_vec();
        let mut meta = HashMap::new();
        meta.insert("k".to_string(), "value".to_string());
        let encoded = encode(&id, &meta);
        for end in 0..encoded.len() {
            assert!(decode(&encoded[..end]).is_err());
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = encode(b"x", &HashMap::new());
        encoded.push(9);
        assert!(decode(&encoded).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::collection::hash_map;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn roundtrip(
            id in prop::collection::vec(any::<u8>(), 0..64),
            meta in hash_map("[a-z]{1,16}", "[a-zA-Z0-9]{0,64}", 0..8),
        ) {
            let encoded = encode(&id, &meta);
            let (got_id, got_meta) = decode(&encoded).unwrap();
            prop_assert_eq!(got_id, id);
            prop_assert_eq!(got_meta, meta);
        }
    }
}
