//! Token codec for the binary RCI wire format.
//!
//! Every token is self-delimiting: the first byte alone tells how many bytes
//! follow, which is what lets the input cursor stitch a token back together
//! across chunk boundaries.
//!
//! ```text
//! ┌─────────────┬────────────────────────────────────┬──────┐
//! │ first byte  │ meaning                            │ size │
//! ├─────────────┼────────────────────────────────────┼──────┤
//! │ 0x00..=0x7F │ integer 0..=127                    │  1   │
//! │ 0x80..=0xBF │ 14-bit integer (low 6 bits + 1 B)  │  2   │
//! │ 0xC0        │ 16-bit BE integer follows          │  3   │
//! │ 0xC1        │ 32-bit BE integer follows          │  5   │
//! │ 0xE0..=0xE5 │ marker (terminator, no value, ...) │  1   │
//! └─────────────┴────────────────────────────────────┴──────┘
//! string := integer(len) ‖ len bytes of UTF-8
//! ```

use std::net::Ipv4Addr;

use crate::error::ProtocolError;

use super::schema::ValueType;
use super::value::ElementValue;

const MBI_ONE_BYTE_MAX: u32 = 0x7F;
const MBI_TWO_BYTE_MAX: u32 = 0x3FFF;
const MBI_TWO_BYTE_FLAG: u8 = 0x80;
const MBI_U16_PREFIX: u8 = 0xC0;
const MBI_U32_PREFIX: u8 = 0xC1;

/// Marker byte values.
pub const TERMINATOR: u8 = 0xE0;
pub const NO_VALUE: u8 = 0xE1;
pub const KEY: u8 = 0xE2;
pub const REMOVE: u8 = 0xE3;
pub const COUNT: u8 = 0xE4;
pub const ERROR: u8 = 0xE5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Terminator,
    NoValue,
    Key,
    Remove,
    Count,
    Error,
}

impl Marker {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            TERMINATOR => Some(Self::Terminator),
            NO_VALUE => Some(Self::NoValue),
            KEY => Some(Self::Key),
            REMOVE => Some(Self::Remove),
            COUNT => Some(Self::Count),
            ERROR => Some(Self::Error),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            Self::Terminator => TERMINATOR,
            Self::NoValue => NO_VALUE,
            Self::Key => KEY,
            Self::Remove => REMOVE,
            Self::Count => COUNT,
            Self::Error => ERROR,
        }
    }
}

/// One decoded integer-or-marker token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Integer(u32),
    Marker(Marker),
}

/// How a token is shaped on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Integer or marker.
    Mbi,
    /// Length-prefixed UTF-8.
    String,
}

impl TokenKind {
    /// Wire shape used for values of `value_type`.
    pub fn for_value(value_type: ValueType) -> Self {
        if value_type.is_text() {
            Self::String
        } else {
            Self::Mbi
        }
    }
}

/// Result of sizing a token against the bytes at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// The token is `n` bytes long and all of them are present.
    Complete(usize),
    /// At least `n` bytes in total are needed before sizing can go further.
    Partial(usize),
}

// ---- Sizing ---------------------------------------------------------------

fn mbi_len(first: u8) -> Result<usize, ProtocolError> {
    match first {
        0x00..=0x7F | TERMINATOR..=ERROR => Ok(1),
        0x80..=0xBF => Ok(2),
        MBI_U16_PREFIX => Ok(3),
        MBI_U32_PREFIX => Ok(5),
        other => Err(ProtocolError::MalformedToken(other)),
    }
}

/// Size an integer-or-marker token.
pub fn measure_mbi(bytes: &[u8]) -> Result<Measure, ProtocolError> {
    let Some(&first) = bytes.first() else {
        return Ok(Measure::Partial(1));
    };
    let len = mbi_len(first)?;
    if bytes.len() >= len {
        Ok(Measure::Complete(len))
    } else {
        Ok(Measure::Partial(len))
    }
}

/// Size a string token, rejecting lengths above `max_len`.
pub fn measure_string(bytes: &[u8], max_len: usize) -> Result<Measure, ProtocolError> {
    let prefix = match measure_mbi(bytes)? {
        Measure::Complete(n) => n,
        partial @ Measure::Partial(_) => return Ok(partial),
    };
    let (token, _) = decode_token(bytes)?;
    let Token::Integer(len) = token else {
        return Err(ProtocolError::UnexpectedMarker);
    };
    let len = len as usize;
    if len > max_len {
        return Err(ProtocolError::OversizedToken { len, max: max_len });
    }
    let total = prefix + len;
    if bytes.len() >= total {
        Ok(Measure::Complete(total))
    } else {
        Ok(Measure::Partial(total))
    }
}

pub fn measure(kind: TokenKind, bytes: &[u8], max_len: usize) -> Result<Measure, ProtocolError> {
    match kind {
        TokenKind::Mbi => measure_mbi(bytes),
        TokenKind::String => measure_string(bytes, max_len),
    }
}

// ---- Decoding -------------------------------------------------------------

/// Decode one integer-or-marker token from a buffer known to hold it.
pub fn decode_token(bytes: &[u8]) -> Result<(Token, usize), ProtocolError> {
    let Measure::Complete(len) = measure_mbi(bytes)? else {
        return Err(ProtocolError::Truncated);
    };
    let first = bytes[0];
    let token = match first {
        0x00..=0x7F => Token::Integer(u32::from(first)),
        0x80..=0xBF => Token::Integer((u32::from(first & 0x3F) << 8) | u32::from(bytes[1])),
        MBI_U16_PREFIX => Token::Integer(u32::from(u16::from_be_bytes([bytes[1], bytes[2]]))),
        MBI_U32_PREFIX => Token::Integer(u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]])),
        marker => match Marker::from_byte(marker) {
            Some(m) => Token::Marker(m),
            None => return Err(ProtocolError::MalformedToken(marker)),
        },
    };
    Ok((token, len))
}

/// Decode an integer, rejecting markers.
pub fn decode_integer(bytes: &[u8]) -> Result<(u32, usize), ProtocolError> {
    match decode_token(bytes)? {
        (Token::Integer(v), n) => Ok((v, n)),
        (Token::Marker(_), _) => Err(ProtocolError::UnexpectedMarker),
    }
}

/// Decode a string token from a buffer known to hold it.
pub fn decode_string(bytes: &[u8]) -> Result<(&str, usize), ProtocolError> {
    let (len, prefix) = decode_integer(bytes)?;
    let end = prefix + len as usize;
    let raw = bytes.get(prefix..end).ok_or(ProtocolError::Truncated)?;
    let text = core::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok((text, end))
}

/// Decode a value of `value_type` from a buffer known to hold it.
pub fn decode_value(value_type: ValueType, bytes: &[u8]) -> Result<(ElementValue, usize), ProtocolError> {
    if value_type.is_text() {
        let (text, n) = decode_string(bytes)?;
        return Ok((ElementValue::Text(text.into()), n));
    }
    let (raw, n) = decode_integer(bytes)?;
    let value = match value_type {
        ValueType::Int32 => ElementValue::Signed(raw as i32),
        ValueType::Uint32 | ValueType::Hex32 | ValueType::ZeroXHex32 => ElementValue::Unsigned(raw),
        ValueType::Float => ElementValue::Float(f32::from_bits(raw)),
        ValueType::Enum => ElementValue::Enum(raw),
        ValueType::OnOff | ValueType::Boolean => {
            let on = match raw {
                0 => false,
                1 => true,
                _ => return Err(ProtocolError::BadValue),
            };
            if value_type == ValueType::OnOff {
                ElementValue::OnOff(on)
            } else {
                ElementValue::Boolean(on)
            }
        }
        ValueType::Ipv4 => ElementValue::Ipv4(Ipv4Addr::from(raw)),
        _ => return Err(ProtocolError::BadValue),
    };
    Ok((value, n))
}

// ---- Encoding -------------------------------------------------------------

/// Append `value` in its shortest integer form.
pub fn encode_mbi(value: u32, out: &mut Vec<u8>) {
    if value <= MBI_ONE_BYTE_MAX {
        out.push(value as u8);
    } else if value <= MBI_TWO_BYTE_MAX {
        out.push(MBI_TWO_BYTE_FLAG | (value >> 8) as u8);
        out.push(value as u8);
    } else if let Ok(short) = u16::try_from(value) {
        out.push(MBI_U16_PREFIX);
        out.extend_from_slice(&short.to_be_bytes());
    } else {
        out.push(MBI_U32_PREFIX);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

pub fn encode_marker(marker: Marker, out: &mut Vec<u8>) {
    out.push(marker.byte());
}

pub fn encode_string(text: &str, out: &mut Vec<u8>) {
    encode_mbi(text.len() as u32, out);
    out.extend_from_slice(text.as_bytes());
}

pub fn encode_value(value: &ElementValue, out: &mut Vec<u8>) {
    match value {
        ElementValue::Text(text) => encode_string(text, out),
        ElementValue::Signed(v) => encode_mbi(*v as u32, out),
        ElementValue::Unsigned(v) | ElementValue::Enum(v) => encode_mbi(*v, out),
        ElementValue::Float(v) => encode_mbi(v.to_bits(), out),
        ElementValue::OnOff(on) | ElementValue::Boolean(on) => encode_mbi(u32::from(*on), out),
        ElementValue::Ipv4(addr) => encode_mbi(u32::from(*addr), out),
    }
}
