//! Request parser: commands, attributes and the token reads the traversal
//! drives.
//!
//! Every read returns `Ok(None)` when the chunk ran out before the token was
//! complete. The traversal then reports `NeedMoreInput` and retries the same
//! read after the transport supplies the next chunk.

use heapless::String as BoundedString;

use crate::error::ProtocolError;

use super::RCI_COMMANDS_ATTRIBUTE_MAX_LEN;
use super::buffer::{InputChunk, InputCursor};
use super::codec::{self, Token, TokenKind};
use super::schema::{GroupType, ValueType};
use super::value::ElementValue;

/// Set in the command token when attributes follow.
pub const ATTRIBUTE_FLAG: u32 = 0x40;

/// Most attributes any command defines.
pub const MAX_ATTRIBUTES: u32 = 2;

// ── Commands ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandId {
    SetSetting = 1,
    SetState = 2,
    QuerySetting = 3,
    QueryState = 4,
    DoCommand = 6,
    Reboot = 7,
    SetFactoryDefault = 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Query,
    Set,
}

impl CommandId {
    pub fn from_wire(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::SetSetting),
            2 => Some(Self::SetState),
            3 => Some(Self::QuerySetting),
            4 => Some(Self::QueryState),
            6 => Some(Self::DoCommand),
            7 => Some(Self::Reboot),
            8 => Some(Self::SetFactoryDefault),
            _ => None,
        }
    }

    pub fn wire(self) -> u32 {
        self as u32
    }

    /// Tree-walking commands: the action and the group type they walk.
    pub fn action(self) -> Option<(Action, GroupType)> {
        match self {
            Self::SetSetting => Some((Action::Set, GroupType::Setting)),
            Self::SetState => Some((Action::Set, GroupType::State)),
            Self::QuerySetting => Some((Action::Query, GroupType::Setting)),
            Self::QueryState => Some((Action::Query, GroupType::State)),
            Self::DoCommand | Self::Reboot | Self::SetFactoryDefault => None,
        }
    }

    pub fn is_legacy(self) -> bool {
        self.action().is_none()
    }
}

/// `source` attribute of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Source {
    #[default]
    Current,
    Stored,
    Defaults,
}

/// `compare_to` attribute of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareTo {
    #[default]
    None,
    Current,
    Stored,
    Defaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryAttributes {
    pub source: Source,
    pub compare_to: CompareTo,
}

const ATTR_SOURCE: u32 = 0;
const ATTR_COMPARE_TO: u32 = 1;
const ATTR_TARGET: u32 = 0;

/// The command being executed.
#[derive(Debug, Clone, Default)]
pub struct Command {
    pub id: Option<CommandId>,
    pub attributes: QueryAttributes,
    /// do_command target subsystem.
    pub target: Option<BoundedString<RCI_COMMANDS_ATTRIBUTE_MAX_LEN>>,
    /// do_command request payload.
    pub payload: String,
    pub(crate) attributes_left: u32,
    pub(crate) attribute_id: Option<u32>,
}

impl Command {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn action(&self) -> Option<Action> {
        self.id.and_then(CommandId::action).map(|(action, _)| action)
    }

    pub fn is_query(&self) -> bool {
        self.action() == Some(Action::Query)
    }

    pub fn is_set(&self) -> bool {
        self.action() == Some(Action::Set)
    }

    /// Compare-to suppression was requested.
    pub fn compares(&self) -> bool {
        self.is_query() && self.attributes.compare_to != CompareTo::None
    }
}

// ── Parser ────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Parser {
    input: InputCursor,
}

impl Parser {
    pub fn new(storage_size: usize, max_string_len: usize) -> Self {
        Self {
            input: InputCursor::new(storage_size, max_string_len),
        }
    }

    pub fn input(&self) -> &InputCursor {
        &self.input
    }

    pub fn bind(&mut self, chunk: InputChunk<'_>) {
        self.input.bind(chunk);
    }

    pub fn reset(&mut self) {
        self.input.reset();
    }

    pub fn discard(&mut self) {
        self.input.discard();
    }

    /// Look at the next integer-or-marker token without consuming it.
    pub fn peek(&mut self) -> Result<Option<Token>, ProtocolError> {
        if !self.input.fill(TokenKind::Mbi)? {
            return Ok(None);
        }
        codec::decode_token(self.input.token_bytes()).map(|(t, _)| Some(t))
    }

    /// Consume the token returned by the last `peek`.
    pub fn consume(&mut self) {
        self.input.advance();
    }

    pub fn token(&mut self) -> Result<Option<Token>, ProtocolError> {
        let token = self.peek()?;
        if token.is_some() {
            self.consume();
        }
        Ok(token)
    }

    pub fn integer(&mut self) -> Result<Option<u32>, ProtocolError> {
        match self.token()? {
            Some(Token::Integer(v)) => Ok(Some(v)),
            Some(Token::Marker(_)) => Err(ProtocolError::UnexpectedMarker),
            None => Ok(None),
        }
    }

    pub fn string(&mut self) -> Result<Option<String>, ProtocolError> {
        if !self.input.fill(TokenKind::String)? {
            return Ok(None);
        }
        let text = codec::decode_string(self.input.token_bytes())?.0.to_owned();
        self.input.advance();
        Ok(Some(text))
    }

    fn short_string<const N: usize>(&mut self) -> Result<Option<BoundedString<N>>, ProtocolError> {
        if !self.input.fill_limited(TokenKind::String, N)? {
            return Ok(None);
        }
        let (text, _) = codec::decode_string(self.input.token_bytes())?;
        let mut bounded = BoundedString::new();
        bounded
            .push_str(text)
            .map_err(|()| ProtocolError::OversizedToken { len: text.len(), max: N })?;
        self.input.advance();
        Ok(Some(bounded))
    }

    pub fn value(&mut self, value_type: ValueType) -> Result<Option<ElementValue>, ProtocolError> {
        if !self.input.fill(TokenKind::for_value(value_type))? {
            return Ok(None);
        }
        let (value, _) = codec::decode_value(value_type, self.input.token_bytes())?;
        self.input.advance();
        Ok(Some(value))
    }

    /// Read the command token.
    pub fn command(&mut self, legacy_enabled: bool) -> Result<Option<(CommandId, bool)>, ProtocolError> {
        let Some(raw) = self.integer()? else {
            return Ok(None);
        };
        let has_attributes = raw & ATTRIBUTE_FLAG != 0;
        let wire = raw & !ATTRIBUTE_FLAG;
        match CommandId::from_wire(wire) {
            Some(id) if id.is_legacy() && !legacy_enabled => Err(ProtocolError::UnknownCommand(wire)),
            Some(id) => Ok(Some((id, has_attributes))),
            None => Err(ProtocolError::UnknownCommand(wire)),
        }
    }

    /// Read one attribute value into `command`. The attribute id has
    /// already been read into `command.attribute_id`.
    pub fn attribute(&mut self, command: &mut Command) -> Result<Option<()>, ProtocolError> {
        let (Some(id), Some(attr)) = (command.id, command.attribute_id) else {
            return Err(ProtocolError::UnexpectedMarker);
        };
        match (id, attr) {
            (CommandId::DoCommand, ATTR_TARGET) => {
                let Some(target) = self.short_string::<RCI_COMMANDS_ATTRIBUTE_MAX_LEN>()? else {
                    return Ok(None);
                };
                command.target = Some(target);
            }
            (CommandId::QuerySetting | CommandId::QueryState, ATTR_SOURCE) => {
                let Some(index) = self.integer()? else {
                    return Ok(None);
                };
                command.attributes.source = match index {
                    0 => Source::Current,
                    1 => Source::Stored,
                    2 => Source::Defaults,
                    _ => return Err(ProtocolError::BadAttributeValue(attr)),
                };
            }
            (CommandId::QuerySetting | CommandId::QueryState, ATTR_COMPARE_TO) => {
                let Some(index) = self.integer()? else {
                    return Ok(None);
                };
                command.attributes.compare_to = match index {
                    0 => CompareTo::None,
                    1 => CompareTo::Current,
                    2 => CompareTo::Stored,
                    3 => CompareTo::Defaults,
                    _ => return Err(ProtocolError::BadAttributeValue(attr)),
                };
            }
            _ => return Err(ProtocolError::UnknownAttribute(attr)),
        }
        command.attribute_id = None;
        Ok(Some(()))
    }
}
