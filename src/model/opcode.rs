//! Access-layer opcodes and PDU framing.
//!
//! ```text
//!   0xxxxxxx                      1-octet SIG opcode (0x7F reserved)
//!   10xxxxxx xxxxxxxx             2-octet SIG opcode (big endian)
//!   11xxxxxx xxxxxxxx xxxxxxxx    3-octet vendor opcode (company id LE)
//! ```
//!
//! The OnOff models only use 2-octet opcodes, but the framing helpers
//! accept any valid opcode so unknown traffic can be skipped cleanly.

use crate::error::DecodeError;

/// Generic OnOff opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Get,
    Set,
    SetUnacknowledged,
    Status,
}

impl Opcode {
    pub const GET: u32 = 0x8201;
    pub const SET: u32 = 0x8202;
    pub const SET_UNACK: u32 = 0x8203;
    pub const STATUS: u32 = 0x8204;

    /// Raw opcode value as it appears on the wire.
    pub const fn value(self) -> u32 {
        match self {
            Self::Get => Self::GET,
            Self::Set => Self::SET,
            Self::SetUnacknowledged => Self::SET_UNACK,
            Self::Status => Self::STATUS,
        }
    }

    /// Map a raw opcode to a Generic OnOff opcode.
    pub const fn from_value(raw: u32) -> Option<Self> {
        match raw {
            Self::GET => Some(Self::Get),
            Self::SET => Some(Self::Set),
            Self::SET_UNACK => Some(Self::SetUnacknowledged),
            Self::STATUS => Some(Self::Status),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Get => "Get",
            Self::Set => "Set",
            Self::SetUnacknowledged => "Set Unack",
            Self::Status => "Status",
        }
    }
}

/// Number of octets a raw opcode occupies on the wire, `None` for values
/// outside the 1-, 2- and 3-octet ranges (including reserved `0x7F`).
pub fn opcode_len(raw: u32) -> Option<usize> {
    match raw {
        0x00..=0x7E => Some(1),
        0x8000..=0xBFFF => Some(2),
        0xC0_0000..=0xFF_FFFF => Some(3),
        _ => None,
    }
}

/// Split an access PDU into `(raw opcode, payload)`.
pub fn parse_access(pdu: &[u8]) -> Result<(u32, &[u8]), DecodeError> {
    let first = *pdu.first().ok_or(DecodeError::InvalidOpcode)?;
    match first >> 6 {
        0b00 | 0b01 => {
            if first == 0x7F {
                return Err(DecodeError::InvalidOpcode);
            }
            Ok((first as u32, &pdu[1..]))
        }
        0b10 => {
            if pdu.len() < 2 {
                return Err(DecodeError::InvalidOpcode);
            }
            Ok((u32::from_be_bytes([0, 0, pdu[0], pdu[1]]), &pdu[2..]))
        }
        _ => {
            if pdu.len() < 3 {
                return Err(DecodeError::InvalidOpcode);
            }
            Ok((u32::from_be_bytes([0, pdu[0], pdu[1], pdu[2]]), &pdu[3..]))
        }
    }
}

/// Write `[opcode][payload]` into `out`.  Returns the bytes written, or
/// `None` if `raw` is not a valid opcode or `out` is too small.
pub fn encode_access(raw: u32, payload: &[u8], out: &mut [u8]) -> Option<usize> {
    let op_len = opcode_len(raw)?;
    let total = op_len + payload.len();
    if total > out.len() {
        return None;
    }
    let be = raw.to_be_bytes();
    out[..op_len].copy_from_slice(&be[4 - op_len..]);
    out[op_len..total].copy_from_slice(payload);
    Some(total)
}
