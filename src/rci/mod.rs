//! Remote Configuration Interface engine.
//!
//! Streams a binary request through a schema-driven state machine, asks the
//! application for every value through a single callback port, and streams
//! the binary response back, all in bounded chunks:
//!
//! ```text
//!  transport ─▶ RciService ─▶ SessionPool ─▶ RciSession
//!                                              │
//!     request chunks ─▶ InputCursor ─▶ Parser ─┤
//!                                              ▼
//!                       TraversalCursor ◀── traverse (state machine)
//!                                              │ trigger
//!                                              ▼
//!                       RemoteConfigHandler ◀── callback dispatcher
//!                                              │
//!    response chunks ◀─ OutputCursor ◀─ Generator
//! ```
//!
//! The engine owns no configuration data. Groups, lists and elements are
//! described by an [`RciDescriptor`]; their values live with the
//! application.

pub mod buffer;
pub mod callback;
pub mod codec;
pub mod cursor;
pub mod errors;
pub mod generator;
pub mod parser;
pub mod pool;
pub mod schema;
pub mod service;
pub mod session;
pub mod traverse;
pub mod value;

/// Deepest list nesting inside a group.
pub const RCI_LIST_MAX_DEPTH: usize = 4;

/// Longest do_command target attribute (bytes).
pub const RCI_COMMANDS_ATTRIBUTE_MAX_LEN: usize = 32;

pub use buffer::{InputChunk, OutputChunk};
pub use callback::{CallbackRequest, CallbackResponse, CallbackStatus};
pub use cursor::Instance;
pub use errors::GlobalError;
pub use schema::{Access, Collection, ElementDef, GroupDef, GroupType, ListDef, RciDescriptor, Schema, ValueType};
pub use service::{RciService, ServiceReply, ServiceRequest, ServiceStatus};
pub use session::{RciSession, SessionStatus};
pub use value::{ElementValue, ValueLimit};
