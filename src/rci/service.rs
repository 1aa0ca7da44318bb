//! Transport service adapter.
//!
//! Binds the engine to a message-oriented transport. The transport hands
//! over one [`ServiceRequest`] per event on a session; the service routes it
//! to the right pooled [`RciSession`] and answers with a [`ServiceReply`].
//!
//! ```text
//!  transport ──▶ Data{first}  ──▶ acquire slot ─▶ session.start
//!            ──▶ Data         ──▶ session.resume
//!            ──▶ Error        ──▶ session.cancel ─▶ release
//!            ──▶ Free         ──▶ (cancel if live) ─▶ release
//!                                       │
//!            ◀── ServiceReply { status, output } ◀┘
//! ```
//!
//! | SessionStatus  | ServiceStatus | transport action                |
//! |----------------|---------------|---------------------------------|
//! | NeedMoreInput  | Working       | deliver the next request chunk  |
//! | Busy           | Pending       | poll again later                |
//! | FlushOutput    | Active        | send the output, then poll      |
//! | Complete       | Complete      | send the final output           |
//! | InternalError  | Cancel        | reply with a transport error    |
//! | Error          | Abort         | drop the session                |

use log::{info, warn};

use crate::app::ports::RemoteConfigHandler;
use crate::config::RciConfig;
use crate::error::{PoolError, Result};

use super::buffer::{InputChunk, OutputChunk};
use super::pool::SessionPool;
use super::schema::RciDescriptor;
use super::session::SessionStatus;

/// One transport event.
#[derive(Debug, Clone, Copy)]
pub enum ServiceRequest<'a> {
    /// Request bytes (or a plain poll when `input` is `None`).
    Data {
        session: u32,
        input: Option<InputChunk<'a>>,
    },
    /// The transport lost the session.
    Error { session: u32 },
    /// The transport is done with the session.
    Free { session: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Working,
    Pending,
    Active,
    Complete,
    Cancel,
    Abort,
}

impl From<SessionStatus> for ServiceStatus {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::NeedMoreInput => Self::Working,
            SessionStatus::Busy => Self::Pending,
            SessionStatus::FlushOutput => Self::Active,
            SessionStatus::Complete => Self::Complete,
            SessionStatus::InternalError => Self::Cancel,
            SessionStatus::Error => Self::Abort,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReply {
    pub status: ServiceStatus,
    pub output: Option<OutputChunk>,
}

impl ServiceReply {
    fn bare(status: ServiceStatus) -> Self {
        Self { status, output: None }
    }
}

/// RCI endpoint of the device.
pub struct RciService<const N: usize> {
    descriptor: RciDescriptor,
    config: RciConfig,
    pool: SessionPool<N>,
}

impl<const N: usize> RciService<N> {
    /// Validate configuration and schema, then build an idle service.
    pub fn new(descriptor: RciDescriptor, config: RciConfig) -> Result<Self> {
        config.validate()?;
        descriptor.schema.validate()?;
        info!(
            "RCI service: {} setting / {} state groups, {} session slot(s)",
            descriptor.schema.setting.len(),
            descriptor.schema.state.len(),
            N
        );
        Ok(Self {
            descriptor,
            config,
            pool: SessionPool::new(),
        })
    }

    pub fn descriptor(&self) -> &RciDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &RciConfig {
        &self.config
    }

    pub fn active_sessions(&self) -> usize {
        self.pool.active()
    }

    /// Route one transport event.
    pub fn handle<H>(&mut self, request: ServiceRequest<'_>, handler: &mut H) -> Result<ServiceReply>
    where
        H: RemoteConfigHandler + ?Sized,
    {
        match request {
            ServiceRequest::Data { session, input } => self.data(session, input, handler),
            ServiceRequest::Error { session } => {
                warn!("RCI service: session {} lost", session);
                self.drop_session(session, handler)?;
                Ok(ServiceReply::bare(ServiceStatus::Complete))
            }
            ServiceRequest::Free { session } => {
                self.drop_session(session, handler)?;
                Ok(ServiceReply::bare(ServiceStatus::Complete))
            }
        }
    }

    fn data<H>(&mut self, id: u32, input: Option<InputChunk<'_>>, handler: &mut H) -> Result<ServiceReply>
    where
        H: RemoteConfigHandler + ?Sized,
    {
        let status = if let Some(session) = self.pool.get_mut(id) {
            session.resume(&self.descriptor, handler, input)
        } else if let Some(chunk) = input {
            let session = self.pool.acquire(id, &self.config)?;
            session.start(&self.descriptor, handler, chunk)
        } else {
            return Err(PoolError::Unknown(id).into());
        };

        let output = match status {
            SessionStatus::FlushOutput | SessionStatus::Complete => {
                self.pool.get_mut(id).map(|session| session.take_output())
            }
            _ => None,
        };
        if status.is_terminal() {
            self.pool.release(id)?;
        }
        Ok(ServiceReply {
            status: status.into(),
            output,
        })
    }

    fn drop_session<H>(&mut self, id: u32, handler: &mut H) -> Result<()>
    where
        H: RemoteConfigHandler + ?Sized,
    {
        let Some(session) = self.pool.get_mut(id) else {
            return Ok(());
        };
        if !session.status().is_terminal() {
            session.cancel(&self.descriptor, handler);
        }
        self.pool.release(id)?;
        Ok(())
    }
}
