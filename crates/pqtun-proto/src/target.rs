//! Target-request codec: the payload the client sends immediately after the
//! handshake, naming the upstream to dial and the per-direction timeouts.

use thiserror::Error;

/// Maximum packed size: 1 + 8 (net) + 1 + 255 (host) + 2 (port) + 6*2 (timeouts).
pub const MAX_TARGET_SIZE: usize = 1 + 8 + 1 + 255 + 2 + 2 + 2 + 2 + 2 + 2 + 2;

const MAX_NET_LEN: usize = 8;
const MAX_HOST_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub net: String,
    pub host: String,
    pub port: u16,
    pub r_to_a: u16,
    pub r_to_b: u16,
    pub w_to_a: u16,
    pub w_to_b: u16,
    pub c_to_a: u16,
    pub c_to_b: u16,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TargetCodecError {
    #[error("net field is too long: {0} bytes, max {MAX_NET_LEN}")]
    NetTooLong(usize),
    #[error("host field is too long: {0} bytes, max {MAX_HOST_LEN}")]
    HostTooLong(usize),
    #[error("malformed target request")]
    Malformed,
}

impl Target {
    pub fn pack(&self) -> Result<Vec<u8>, TargetCodecError> {
        if self.net.len() > MAX_NET_LEN {
            return Err(TargetCodecError::NetTooLong(self.net.len()));
        }
        if self.host.len() > MAX_HOST_LEN {
            return Err(TargetCodecError::HostTooLong(self.host.len()));
        }

        let mut buf = Vec::with_capacity(1 + self.net.len() + 1 + self.host.len() + 14);
        buf.push(self.net.len() as u8);
        buf.extend_from_slice(self.net.as_bytes());
        buf.push(self.host.len() as u8);
        buf.extend_from_slice(self.host.as_bytes());
        buf.extend_from_slice(&self.port.to_be_bytes());
        buf.extend_from_slice(&self.r_to_a.to_be_bytes());
        buf.extend_from_slice(&self.r_to_b.to_be_bytes());
        buf.extend_from_slice(&self.w_to_a.to_be_bytes());
        buf.extend_from_slice(&self.w_to_b.to_be_bytes());
        buf.extend_from_slice(&self.c_to_a.to_be_bytes());
        buf.extend_from_slice(&self.c_to_b.to_be_bytes());

        Ok(buf)
    }

    pub fn unpack(buf: &[u8]) -> Result<Self, TargetCodecError> {
        let mut cursor = Cursor::new(buf);

        let net_len = cursor.take_u8()? as usize;
        let net = cursor.take_str(net_len)?;

        let host_len = cursor.take_u8()? as usize;
        let host = cursor.take_str(host_len)?;

        let port = cursor.take_u16()?;
        let r_to_a = cursor.take_u16()?;
        let r_to_b = cursor.take_u16()?;
        let w_to_a = cursor.take_u16()?;
        let w_to_b = cursor.take_u16()?;
        let c_to_a = cursor.take_u16()?;
        let c_to_b = cursor.take_u16()?;

        cursor.finish()?;

        Ok(Target {
            net,
            host,
            port,
            r_to_a,
            r_to_b,
            w_to_a,
            w_to_b,
            c_to_a,
            c_to_b,
        })
    }
}

/// Minimal forward-only cursor that turns out-of-bounds reads into `Malformed`
/// and rejects unconsumed trailing bytes.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TargetCodecError> {
        let end = self.pos.checked_add(n).ok_or(TargetCodecError::Malformed)?;
        if end > self.buf.len() {
            return Err(TargetCodecError::Malformed);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, TargetCodecError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, TargetCodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// `net`/`host` are opaque bytes on the wire, not guaranteed UTF-8; this
    /// never fails, matching a raw byte-to-string conversion rather than
    /// validating encoding.
    fn take_str(&mut self, len: usize) -> Result<String, TargetCodecError> {
        let b = self.take(len)?;
        Ok(String::from_utf8_lossy(b).into_owned())
    }

    fn finish(self) -> Result<(), TargetCodecError> {
        if self.pos != self.buf.len() {
            return Err(TargetCodecError::Malformed);
        }
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn roundtrip(
            net in "[a-z]{1,8}",
            host in "[a-zA-Z0-9.-]{1,255}",
            port: u16,
            r_to_a: u16, r_to_b: u16, w_to_a: u16, w_to_b: u16, c_to_a: u16, c_to_b: u16,
        ) {
            let t = Target { net, host, port, r_to_a, r_to_b, w_to_a, w_to_b, c_to_a, c_to_b };
            let packed = t.pack().unwrap();
            let unpacked = Target::unpack(&packed).unwrap();
            prop_assert_eq!(t, unpacked);
        }
    }
}
