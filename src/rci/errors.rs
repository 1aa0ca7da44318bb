//! Global and group-local error tables.
//!
//! ```text
//!  id: 1 ........ 6 | 7 ........ G | G+1 ........
//!      protocol     | user global  | group-local (index id - (G+1))
//! ```
//!
//! `G` is the global error count. Ids at or above the group error base are
//! looked up in the table of the group being traversed when the error was
//! raised.

use super::schema::{GroupDef, RciDescriptor};

/// Protocol-defined global errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GlobalError {
    BadCommand = 1,
    BadDescriptor = 2,
    BadValue = 3,
    DoCommandFailed = 4,
    RebootFailed = 5,
    SetFactoryDefaultFailed = 6,
}

/// Number of protocol-defined global errors.
pub const PROTOCOL_ERROR_COUNT: u32 = 6;

/// First id available to deployment-defined global errors.
pub const FIRST_USER_GLOBAL_ERROR: u32 = PROTOCOL_ERROR_COUNT + 1;

impl GlobalError {
    pub const ALL: [Self; PROTOCOL_ERROR_COUNT as usize] = [
        Self::BadCommand,
        Self::BadDescriptor,
        Self::BadValue,
        Self::DoCommandFailed,
        Self::RebootFailed,
        Self::SetFactoryDefaultFailed,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BadCommand => "bad_command",
            Self::BadDescriptor => "bad_descriptor",
            Self::BadValue => "bad_value",
            Self::DoCommandFailed => "do_command_failed",
            Self::RebootFailed => "reboot_failed",
            Self::SetFactoryDefaultFailed => "set_factory_default_failed",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::BadCommand => "Bad command",
            Self::BadDescriptor => "Bad configuration",
            Self::BadValue => "Bad value",
            Self::DoCommandFailed => "Command failed",
            Self::RebootFailed => "Reboot failed",
            Self::SetFactoryDefaultFailed => "Set factory default failed",
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.id() == id)
    }
}

/// Which table an error id resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Protocol(GlobalError),
    /// Index into the descriptor's user global table.
    UserGlobal(usize),
    /// Index into the current group's table.
    Group(usize),
}

impl RciDescriptor {
    /// Protocol errors plus user globals.
    pub fn global_error_count(&self) -> u32 {
        PROTOCOL_ERROR_COUNT + self.global_errors.len() as u32
    }

    /// First group-local error id.
    pub fn group_error_base(&self) -> u32 {
        self.global_error_count() + 1
    }

    pub fn classify_error(&self, id: u32) -> ErrorScope {
        if let Some(global) = GlobalError::from_id(id) {
            ErrorScope::Protocol(global)
        } else if id < self.group_error_base() {
            ErrorScope::UserGlobal(id.saturating_sub(FIRST_USER_GLOBAL_ERROR) as usize)
        } else {
            ErrorScope::Group((id - self.group_error_base()) as usize)
        }
    }

    /// Description for `id`, consulting `group` for group-local ids.
    pub fn describe_error<'a>(&'a self, group: Option<&'a GroupDef>, id: u32) -> Option<&'a str> {
        match self.classify_error(id) {
            ErrorScope::Protocol(global) => Some(global.description()),
            ErrorScope::UserGlobal(index) => self.global_errors.get(index).map(|e| e.description.as_str()),
            ErrorScope::Group(index) => group?.errors.get(index).map(|e| e.description.as_str()),
        }
    }
}
