//! Unified error types for the RCI connector.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! session controller's error handling uniform. All variants are `Copy` so
//! they can be carried through the traversal state machine without
//! allocation.

use core::fmt;

use crate::rci::errors::GlobalError;

// ---------------------------------------------------------------------------
// Top-level connector error
// ---------------------------------------------------------------------------

/// Every fallible operation in the connector funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The peer sent a request the parser could not accept.
    Protocol(ProtocolError),
    /// The configuration descriptor failed validation.
    Schema(SchemaError),
    /// The session pool could not satisfy a request.
    Pool(PoolError),
    /// Tunables are inconsistent.
    Config(&'static str),
    /// An engine invariant was violated.
    Internal(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Schema(e) => write!(f, "schema: {e}"),
            Self::Pool(e) => write!(f, "pool: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Internal(msg) => write!(f, "internal: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// Faults detected while decoding a request.
///
/// Each one is fatal to the current command and is reported to the peer as
/// one of the protocol-defined global errors (see [`ProtocolError::rci_error`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Command id not in the supported set (or a disabled legacy command).
    UnknownCommand(u32),
    /// First byte of a token is not a valid integer or marker encoding.
    MalformedToken(u8),
    /// A marker appeared where an integer or string was required.
    UnexpectedMarker,
    /// The last input fragment ended in the middle of a token.
    Truncated,
    /// More attributes than the command can carry.
    TooManyAttributes(u32),
    /// Attribute id not defined for this command.
    UnknownAttribute(u32),
    /// Attribute value outside its enumeration.
    BadAttributeValue(u32),
    /// String token longer than the configured maximum.
    OversizedToken { len: usize, max: usize },
    /// String payload is not UTF-8.
    InvalidUtf8,
    /// Group id not present in the schema.
    BadGroupId(u32),
    /// Element id not present in the current collection.
    BadElementId(u32),
    /// Instance index or key not present in the collection.
    BadInstance,
    /// Locator kind does not match the collection kind.
    BadLocator,
    /// COUNT or REMOVE used where the collection or action forbids it.
    BadCollectionEdit,
    /// Encoded value is out of range for its type.
    BadValue,
}

impl ProtocolError {
    /// The protocol-defined global error reported to the peer.
    pub fn rci_error(self) -> GlobalError {
        match self {
            Self::UnknownCommand(_)
            | Self::MalformedToken(_)
            | Self::UnexpectedMarker
            | Self::Truncated
            | Self::TooManyAttributes(_)
            | Self::UnknownAttribute(_)
            | Self::BadAttributeValue(_)
            | Self::BadLocator
            | Self::BadCollectionEdit => GlobalError::BadCommand,
            Self::BadGroupId(_) | Self::BadElementId(_) | Self::BadInstance => {
                GlobalError::BadDescriptor
            }
            Self::OversizedToken { .. } | Self::InvalidUtf8 | Self::BadValue => {
                GlobalError::BadValue
            }
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand(id) => write!(f, "unknown command {id}"),
            Self::MalformedToken(b) => write!(f, "malformed token 0x{b:02X}"),
            Self::UnexpectedMarker => write!(f, "unexpected marker"),
            Self::Truncated => write!(f, "request truncated"),
            Self::TooManyAttributes(n) => write!(f, "too many attributes ({n})"),
            Self::UnknownAttribute(id) => write!(f, "unknown attribute {id}"),
            Self::BadAttributeValue(id) => write!(f, "bad value for attribute {id}"),
            Self::OversizedToken { len, max } => write!(f, "token of {len} bytes exceeds {max}"),
            Self::InvalidUtf8 => write!(f, "string is not UTF-8"),
            Self::BadGroupId(id) => write!(f, "unknown group {id}"),
            Self::BadElementId(id) => write!(f, "unknown element {id}"),
            Self::BadInstance => write!(f, "unknown instance"),
            Self::BadLocator => write!(f, "locator does not match collection"),
            Self::BadCollectionEdit => write!(f, "collection cannot be edited"),
            Self::BadValue => write!(f, "value out of range"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Schema errors
// ---------------------------------------------------------------------------

/// Descriptor validation failures, reported once at facility init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaError {
    /// A group, list or element has an empty name.
    EmptyName,
    /// A group or list has no elements.
    NoElements,
    /// A fixed array declared with zero instances.
    EmptyFixedArray,
    /// Lists nest deeper than the traversal stack allows.
    ListTooDeep { depth: usize, max: usize },
    /// A list element has no nested definition.
    MissingList,
    /// A non-list element carries a nested definition.
    UnexpectedList,
    /// A value limit does not fit the element's value type.
    LimitMismatch,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "empty name"),
            Self::NoElements => write!(f, "collection has no elements"),
            Self::EmptyFixedArray => write!(f, "fixed array with zero instances"),
            Self::ListTooDeep { depth, max } => write!(f, "list depth {depth} exceeds {max}"),
            Self::MissingList => write!(f, "list element without definition"),
            Self::UnexpectedList => write!(f, "list definition on scalar element"),
            Self::LimitMismatch => write!(f, "value limit does not match type"),
        }
    }
}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

// ---------------------------------------------------------------------------
// Pool errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Every session slot is in use.
    Exhausted,
    /// A session with this transport id already exists.
    Duplicate(u32),
    /// No session with this transport id.
    Unknown(u32),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "no free session slot"),
            Self::Duplicate(id) => write!(f, "session {id} already active"),
            Self::Unknown(id) => write!(f, "session {id} not found"),
        }
    }
}

impl From<PoolError> for Error {
    fn from(e: PoolError) -> Self {
        Self::Pool(e)
    }
}

/// Convenience alias used throughout the connector.
pub type Result<T> = core::result::Result<T, Error>;
