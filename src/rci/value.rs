//! Element values and their range limits.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::schema::ValueType;

/// A decoded element value, tagged by its wire representation.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// string, multiline string, password, FQDN, MAC address, datetime
    Text(String),
    Signed(i32),
    /// uint32, hex32 and 0x-prefixed hex32
    Unsigned(u32),
    Float(f32),
    /// Index into the element's enumeration
    Enum(u32),
    OnOff(bool),
    Boolean(bool),
    Ipv4(Ipv4Addr),
}

impl ElementValue {
    /// Whether this value can be sent for an element of `value_type`.
    pub fn matches(&self, value_type: ValueType) -> bool {
        match self {
            Self::Text(_) => value_type.is_text(),
            Self::Signed(_) => value_type == ValueType::Int32,
            Self::Unsigned(_) => matches!(
                value_type,
                ValueType::Uint32 | ValueType::Hex32 | ValueType::ZeroXHex32
            ),
            Self::Float(_) => value_type == ValueType::Float,
            Self::Enum(_) => value_type == ValueType::Enum,
            Self::OnOff(_) => value_type == ValueType::OnOff,
            Self::Boolean(_) => value_type == ValueType::Boolean,
            Self::Ipv4(_) => value_type == ValueType::Ipv4,
        }
    }
}

impl From<&str> for ElementValue {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

/// Range constraint attached to an element in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ValueLimit {
    /// Byte length of a text value
    Length { min: u32, max: u32 },
    Signed { min: i32, max: i32 },
    Unsigned { min: u32, max: u32 },
    Float { min: f32, max: f32 },
    /// Number of enumeration entries
    Enum { count: u32 },
}

impl ValueLimit {
    /// Whether the limit can constrain values of `value_type`.
    pub fn fits(&self, value_type: ValueType) -> bool {
        match self {
            Self::Length { .. } => value_type.is_text(),
            Self::Signed { .. } => value_type == ValueType::Int32,
            Self::Unsigned { .. } => matches!(
                value_type,
                ValueType::Uint32 | ValueType::Hex32 | ValueType::ZeroXHex32
            ),
            Self::Float { .. } => value_type == ValueType::Float,
            Self::Enum { .. } => value_type == ValueType::Enum,
        }
    }

    /// Check a decoded value. Values the limit does not apply to pass.
    pub fn check(&self, value: &ElementValue) -> bool {
        match (self, value) {
            (Self::Length { min, max }, ElementValue::Text(text)) => {
                let len = text.len() as u32;
                (*min..=*max).contains(&len)
            }
            (Self::Signed { min, max }, ElementValue::Signed(v)) => (*min..=*max).contains(v),
            (Self::Unsigned { min, max }, ElementValue::Unsigned(v)) => (*min..=*max).contains(v),
            (Self::Float { min, max }, ElementValue::Float(v)) => v.is_finite() && *min <= *v && *v <= *max,
            (Self::Enum { count }, ElementValue::Enum(v)) => v < count,
            _ => true,
        }
    }
}
