//! Port traits: the hexagonal boundary between the RCI engine and the
//! application that owns the configuration.
//!
//! ```text
//!   RciSession ──▶ RemoteConfigHandler ──▶ application (settings store,
//!                                          live state, command handlers)
//! ```
//!
//! The engine consumes the handler via generics, so it never touches
//! configuration storage directly and is fully testable with a recording
//! mock.
//!
//! ## Contract notes
//!
//! - At most one request is outstanding per session. A handler that returns
//!   [`CallbackStatus::Busy`] is called again with an identical request.
//! - A handler MUST treat [`CallbackRequest::SessionCancel`] as an implicit
//!   unlock of every collection it lists.
//! - Error ids below the group error base resolve against the global table,
//!   ids at or above it against the current group's table.

use crate::rci::callback::{CallbackRequest, CallbackResponse, CallbackStatus};

// ───────────────────────────────────────────────────────────────
// Remote configuration port (driven adapter: engine → application)
// ───────────────────────────────────────────────────────────────

/// Single dispatch entry point for every remote-configuration request.
pub trait RemoteConfigHandler {
    fn handle(&mut self, request: &CallbackRequest<'_>, response: &mut CallbackResponse) -> CallbackStatus;
}

impl<F> RemoteConfigHandler for F
where
    F: FnMut(&CallbackRequest<'_>, &mut CallbackResponse) -> CallbackStatus,
{
    fn handle(&mut self, request: &CallbackRequest<'_>, response: &mut CallbackResponse) -> CallbackStatus {
        self(request, response)
    }
}
