//! Session controller: one RCI transaction on one transport session.
//!
//! ```text
//!            start ─┐
//!   resume(chunk?) ─┼─▶ run loop ──┬─ drain output ── full ──▶ FlushOutput
//!                   │              ├─ invoke callback ─ busy ─▶ Busy
//!                   │              │                  └ abort ─▶ Error
//!                   │              └─ step traversal ─ starved ─▶ NeedMoreInput
//!                   │                                └ done ────▶ Complete
//!           cancel ─┴─▶ session_cancel (fire and forget) ──────▶ Complete
//! ```
//!
//! The controller never blocks: every call returns a status telling the
//! transport whether to supply input, take output, retry later or tear the
//! session down.

use log::{error, info, warn};

use crate::app::ports::RemoteConfigHandler;
use crate::config::RciConfig;
use crate::error::Error;

use super::buffer::{InputChunk, OutputChunk};
use super::callback::{CallbackResponse, Dispatch, Phase};
use super::cursor::TraversalCursor;
use super::generator::Generator;
use super::parser::{Command, Parser};
use super::schema::RciDescriptor;
use super::traverse::{Flow, TraverseState};

/// Coarse status reported to the transport after every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// A callback is pending; resume without input to retry it.
    Busy,
    /// Supply the next input chunk.
    NeedMoreInput,
    /// Take the output chunk, then resume.
    FlushOutput,
    /// Response finished; the final output chunk is ready.
    Complete,
    /// The application aborted; no response.
    Error,
    /// Engine fault or misuse; no response.
    InternalError,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::InternalError)
    }
}

/// Which sub-machine currently owns control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Input,
    Output,
    Traverse,
    Error,
}

/// Error captured from a callback or the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSlot {
    pub id: u32,
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct RciSession {
    pub(crate) id: u32,
    pub(crate) config: RciConfig,
    pub(crate) status: SessionStatus,
    pub(crate) parser_state: ParserState,
    pub(crate) state: TraverseState,
    pub(crate) parser: Parser,
    pub(crate) generator: Generator,
    pub(crate) command: Command,
    pub(crate) cursor: TraversalCursor,
    /// Triggered callback not yet completed.
    pub(crate) callback: Option<Phase>,
    /// Response of the last completed callback.
    pub(crate) response: CallbackResponse,
    pub(crate) error: Option<ErrorSlot>,
    /// action_start completed; action_end owed.
    pub(crate) action_started: bool,
}

impl RciSession {
    pub fn new(id: u32, config: &RciConfig) -> Self {
        Self {
            id,
            config: config.clone(),
            status: SessionStatus::NeedMoreInput,
            parser_state: ParserState::Input,
            state: TraverseState::Done,
            parser: Parser::new(config.storage_size, config.max_string_len),
            generator: Generator::new(config.output_chunk_size),
            command: Command::default(),
            cursor: TraversalCursor::new(),
            callback: None,
            response: CallbackResponse::default(),
            error: None,
            action_started: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn parser_state(&self) -> ParserState {
        self.parser_state
    }

    pub fn state(&self) -> TraverseState {
        self.state
    }

    pub fn cursor(&self) -> &TraversalCursor {
        &self.cursor
    }

    /// Begin a transaction with the first request chunk.
    pub fn start<H>(&mut self, desc: &RciDescriptor, handler: &mut H, input: InputChunk<'_>) -> SessionStatus
    where
        H: RemoteConfigHandler + ?Sized,
    {
        info!("RCI[{}]: session start ({} bytes)", self.id, input.data.len());
        if !input.first {
            warn!("RCI[{}]: first chunk not flagged as start of request", self.id);
        }
        self.parser.reset();
        self.generator.reset();
        self.command.reset();
        self.cursor = TraversalCursor::new();
        self.callback = None;
        self.response = CallbackResponse::default();
        self.error = None;
        self.action_started = false;

        self.parser.bind(input);
        self.state = TraverseState::SessionStart;
        self.parser_state = ParserState::Traverse;
        self.status = SessionStatus::Busy;
        self.run(desc, handler)
    }

    /// Continue after new input, drained output or a busy callback.
    pub fn resume<H>(&mut self, desc: &RciDescriptor, handler: &mut H, input: Option<InputChunk<'_>>) -> SessionStatus
    where
        H: RemoteConfigHandler + ?Sized,
    {
        if self.status.is_terminal() {
            warn!("RCI[{}]: resume after {:?}", self.id, self.status);
            return self.internal_error(Error::Internal("session already finished"));
        }
        match input {
            Some(chunk) if self.parser.input().chunk_consumed() => self.parser.bind(chunk),
            Some(_) => {
                return self.internal_error(Error::Internal("input supplied before previous chunk was consumed"));
            }
            None if self.status == SessionStatus::NeedMoreInput => return self.status,
            None => {}
        }
        self.run(desc, handler)
    }

    /// The transport lost the session.
    pub fn cancel<H>(&mut self, desc: &RciDescriptor, handler: &mut H)
    where
        H: RemoteConfigHandler + ?Sized,
    {
        info!("RCI[{}]: session cancel in {:?}", self.id, self.state);
        self.callback = Some(Phase::SessionCancel);
        match self.invoke(desc, handler) {
            Ok(Dispatch::Done) => {}
            Ok(Dispatch::Pending) => warn!("RCI[{}]: cancel callback busy, not retried", self.id),
            Ok(Dispatch::Failed) => warn!("RCI[{}]: cancel callback aborted", self.id),
            Err(e) => warn!("RCI[{}]: cancel callback skipped: {}", self.id, e),
        }
        self.callback = None;
        self.parser.discard();
        self.generator.discard();
        self.state = TraverseState::Done;
        self.status = SessionStatus::Complete;
    }

    /// Hand the current output chunk to the transport.
    pub fn take_output(&mut self) -> OutputChunk {
        let last = self.status == SessionStatus::Complete && !self.generator.has_pending();
        self.generator.take(last)
    }

    fn run<H>(&mut self, desc: &RciDescriptor, handler: &mut H) -> SessionStatus
    where
        H: RemoteConfigHandler + ?Sized,
    {
        loop {
            if !self.generator.drain() {
                self.parser_state = ParserState::Output;
                self.status = SessionStatus::FlushOutput;
                return self.status;
            }
            if self.callback.is_some() {
                match self.invoke(desc, handler) {
                    Ok(Dispatch::Done) => {}
                    Ok(Dispatch::Pending) => {
                        self.status = SessionStatus::Busy;
                        return self.status;
                    }
                    Ok(Dispatch::Failed) => return self.abort(),
                    Err(e) => return self.internal_error(e),
                }
            }
            if self.state == TraverseState::Done {
                info!("RCI[{}]: session complete", self.id);
                self.status = SessionStatus::Complete;
                return self.status;
            }
            if !self.state.is_error() {
                self.parser_state = ParserState::Traverse;
            }
            match self.step(desc) {
                Ok(Flow::Continue) => {}
                Ok(Flow::NeedInput) => {
                    self.parser_state = ParserState::Input;
                    self.status = SessionStatus::NeedMoreInput;
                    return self.status;
                }
                Err(Error::Protocol(e)) => {
                    warn!("RCI[{}]: {}", self.id, e);
                    self.fail(ErrorSlot {
                        id: e.rci_error().id(),
                        hint: None,
                    });
                }
                Err(e) => return self.internal_error(e),
            }
        }
    }

    /// Abort the current command with an error response.
    pub(crate) fn fail(&mut self, slot: ErrorSlot) {
        self.error = Some(slot);
        self.parser_state = ParserState::Error;
        self.state = TraverseState::ErrorReport;
    }

    fn abort(&mut self) -> SessionStatus {
        error!("RCI[{}]: callback aborted session in {:?}", self.id, self.state);
        self.parser.discard();
        self.generator.discard();
        self.state = TraverseState::Done;
        self.parser_state = ParserState::Error;
        self.status = SessionStatus::Error;
        self.status
    }

    fn internal_error(&mut self, e: Error) -> SessionStatus {
        error!("RCI[{}]: {}", self.id, e);
        self.callback = None;
        self.parser.discard();
        self.generator.discard();
        self.state = TraverseState::Done;
        self.parser_state = ParserState::Error;
        self.status = SessionStatus::InternalError;
        self.status
    }
}
