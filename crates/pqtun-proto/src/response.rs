//! Single-byte response codes the server sends after attempting to dial the
//! requested target. Only [`ResponseCode::ConnOpened`] means "proceed to
//! relay"; every other value is terminal and the client must close.

/// Numeric values are assigned consecutively starting at 1, in the order
/// the table lists them. Do not reorder existing variants; the ordinal is
/// the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    InvalidProtocol = 1,
    ResolveFailed = 2,
    MalformedRequest = 3,
    ConnOpened = 4,
    ConnEof = 5,
    ConnRefused = 6,
    ConnReset = 7,
    ConnErrored = 8,
    AReadTimeout = 9,
    BReadTimeout = 10,
    AWriteTimeout = 11,
    BWriteTimeout = 12,
    AConnectTimeout = 13,
    BConnectTimeout = 14,
}

impl ResponseCode {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        use ResponseCode::*;
        Some(match b {
            1 => InvalidProtocol,
            2 => ResolveFailed,
            3 => MalformedRequest,
            4 => ConnOpened,
            5 => ConnEof,
            6 => ConnRefused,
            7 => ConnReset,
            8 => ConnErrored,
            9 => AReadTimeout,
            10 => BReadTimeout,
            11 => AWriteTimeout,
            12 => BWriteTimeout,
            13 => AConnectTimeout,
            14 => BConnectTimeout,
            _ => return None,
        })
    }

    pub fn is_success(self) -> bool {
        matches!(self, ResponseCode::ConnOpened)
    }
}
