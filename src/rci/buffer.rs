//! Bounded input and output cursors over transport chunks.
//!
//! The input cursor keeps a copy of the chunk it was bound to, so a session
//! that stops on a busy callback or a full output buffer can resume later
//! without the transport holding on to its buffer. A token that straddles two
//! chunks is stitched together in `storage`:
//!
//! ```text
//!  chunk n    ┌──────────────┬────┐
//!             │ ...consumed  │ C1 │──┐ partial token copied to storage
//!             └──────────────┴────┘  │
//!  chunk n+1  ┌───────────┬────────┐ │
//!             │ 00 01 00 00 │ ...  │─┴─▶ storage = C1 00 01 00 00 (complete)
//!             └───────────┴────────┘
//! ```
//!
//! The output cursor accumulates already-encoded tokens in `pending` and
//! drains them into the bounded chunk; whatever does not fit waits for the
//! next chunk, so a decided token is never encoded twice.

use log::debug;

use crate::error::ProtocolError;

use super::codec::{self, Measure, TokenKind};

/// One fragment of request bytes from the transport.
#[derive(Debug, Clone, Copy)]
pub struct InputChunk<'a> {
    pub data: &'a [u8],
    /// First fragment of a request.
    pub first: bool,
    /// Final fragment of a request.
    pub last: bool,
}

impl<'a> InputChunk<'a> {
    /// A request delivered in one piece.
    pub fn whole(data: &'a [u8]) -> Self {
        Self {
            data,
            first: true,
            last: true,
        }
    }
}

/// One fragment of response bytes for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub data: Vec<u8>,
    /// First fragment of the response.
    pub first: bool,
    /// Final fragment of the response.
    pub last: bool,
}

// ── Input ─────────────────────────────────────────────────────

#[derive(Debug)]
pub struct InputCursor {
    chunk: Vec<u8>,
    pos: usize,
    last: bool,
    storage: Vec<u8>,
    /// The token being read lives in `storage`, not in `chunk`.
    from_storage: bool,
    /// Length of the token prepared by the last successful `fill`.
    ready: Option<usize>,
    max_string_len: usize,
}

impl InputCursor {
    pub fn new(storage_size: usize, max_string_len: usize) -> Self {
        Self {
            chunk: Vec::new(),
            pos: 0,
            last: false,
            storage: Vec::with_capacity(storage_size),
            from_storage: false,
            ready: None,
            max_string_len,
        }
    }

    /// Rebind to a fresh chunk. A token parked in storage is kept.
    pub fn bind(&mut self, input: InputChunk<'_>) {
        self.chunk.clear();
        self.chunk.extend_from_slice(input.data);
        self.pos = 0;
        self.last = input.last;
        self.ready = None;
    }

    /// Forget everything, storage included.
    pub fn reset(&mut self) {
        self.chunk.clear();
        self.pos = 0;
        self.last = false;
        self.storage.clear();
        self.from_storage = false;
        self.ready = None;
    }

    /// Drop the unread rest of the request.
    pub fn discard(&mut self) {
        self.pos = self.chunk.len();
        self.storage.clear();
        self.from_storage = false;
        self.ready = None;
        self.last = true;
    }

    /// No unread bytes in the current chunk or storage.
    pub fn is_exhausted(&self) -> bool {
        !self.from_storage && self.pos == self.chunk.len()
    }

    /// Every byte of the bound chunk has been read or parked in storage, so
    /// a new chunk can be bound.
    pub fn chunk_consumed(&self) -> bool {
        self.pos == self.chunk.len()
    }

    /// The request has been read completely.
    pub fn at_end(&self) -> bool {
        self.is_exhausted() && self.last
    }

    pub fn is_resuming_from_storage(&self) -> bool {
        self.from_storage
    }

    /// Make the next token of `kind` contiguous.
    ///
    /// Returns `Ok(false)` when the chunk ran out first; the partial bytes
    /// are parked in storage and the caller should ask for more input.
    pub fn fill(&mut self, kind: TokenKind) -> Result<bool, ProtocolError> {
        self.fill_limited(kind, self.max_string_len)
    }

    /// `fill` with an explicit string length limit.
    pub fn fill_limited(&mut self, kind: TokenKind, max_len: usize) -> Result<bool, ProtocolError> {
        if self.ready.is_some() {
            return Ok(true);
        }
        if self.from_storage {
            return self.fill_storage(kind, max_len);
        }
        let rest = &self.chunk[self.pos..];
        match codec::measure(kind, rest, max_len)? {
            Measure::Complete(n) => {
                self.ready = Some(n);
                Ok(true)
            }
            Measure::Partial(_) if self.last => Err(ProtocolError::Truncated),
            Measure::Partial(_) if rest.is_empty() => Ok(false),
            Measure::Partial(needed) => {
                debug!("RCI input: token split at chunk end ({} of {} bytes)", rest.len(), needed);
                self.storage.clear();
                self.storage.extend_from_slice(rest);
                self.pos = self.chunk.len();
                self.from_storage = true;
                Ok(false)
            }
        }
    }

    fn fill_storage(&mut self, kind: TokenKind, max_len: usize) -> Result<bool, ProtocolError> {
        loop {
            match codec::measure(kind, &self.storage, max_len)? {
                Measure::Complete(n) => {
                    self.ready = Some(n);
                    return Ok(true);
                }
                Measure::Partial(needed) => {
                    let available = self.chunk.len() - self.pos;
                    if available == 0 {
                        return if self.last {
                            Err(ProtocolError::Truncated)
                        } else {
                            Ok(false)
                        };
                    }
                    let take = (needed - self.storage.len()).min(available);
                    self.storage
                        .extend_from_slice(&self.chunk[self.pos..self.pos + take]);
                    self.pos += take;
                }
            }
        }
    }

    /// Bytes of the token prepared by `fill`.
    pub fn token_bytes(&self) -> &[u8] {
        let n = self.ready.unwrap_or(0);
        if self.from_storage {
            &self.storage[..n]
        } else {
            &self.chunk[self.pos..self.pos + n]
        }
    }

    /// Step past the token prepared by `fill`.
    pub fn advance(&mut self) {
        let Some(n) = self.ready.take() else {
            return;
        };
        if self.from_storage {
            self.storage.clear();
            self.from_storage = false;
        } else {
            self.pos += n;
        }
    }
}

// ── Output ────────────────────────────────────────────────────

#[derive(Debug)]
pub struct OutputCursor {
    chunk: Vec<u8>,
    capacity: usize,
    /// Encoded bytes waiting for room in `chunk`.
    pending: Vec<u8>,
    flushed: usize,
    first: bool,
}

impl OutputCursor {
    pub fn new(capacity: usize) -> Self {
        Self {
            chunk: Vec::with_capacity(capacity),
            capacity,
            pending: Vec::new(),
            flushed: 0,
            first: true,
        }
    }

    pub fn reset(&mut self) {
        self.chunk.clear();
        self.pending.clear();
        self.flushed = 0;
        self.first = true;
    }

    /// Buffer that encoders append whole tokens to.
    pub fn pending_mut(&mut self) -> &mut Vec<u8> {
        &mut self.pending
    }

    /// Move pending bytes into the chunk. Returns `true` once nothing is
    /// left pending.
    pub fn drain(&mut self) -> bool {
        let space = self.capacity.saturating_sub(self.chunk.len());
        let left = &self.pending[self.flushed..];
        let take = space.min(left.len());
        self.chunk.extend_from_slice(&left[..take]);
        self.flushed += take;
        if self.flushed == self.pending.len() {
            self.pending.clear();
            self.flushed = 0;
            true
        } else {
            false
        }
    }

    pub fn has_pending(&self) -> bool {
        self.flushed < self.pending.len()
    }

    /// Bytes ready for the transport.
    /// Hand the current chunk to the transport and start a fresh one.
    pub fn take(&mut self, last: bool) -> OutputChunk {
        let data = core::mem::replace(&mut self.chunk, Vec::with_capacity(self.capacity));
        let first = core::mem::replace(&mut self.first, false);
        OutputChunk { data, first, last }
    }

    /// Throw away everything not yet taken.
    pub fn discard(&mut self) {
        self.chunk.clear();
        self.pending.clear();
        self.flushed = 0;
    }
}
