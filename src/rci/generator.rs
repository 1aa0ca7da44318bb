//! Response generator.
//!
//! Encodes traversal output into the output cursor and tracks how many
//! response scopes are open, so an error can close them all.

use super::buffer::{OutputChunk, OutputCursor};
use super::codec::{self, Marker};
use super::cursor::Instance;
use super::value::ElementValue;

/// Error token contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport<'a> {
    pub id: u32,
    pub description: Option<&'a str>,
    pub hint: Option<&'a str>,
}

#[derive(Debug)]
pub struct Generator {
    out: OutputCursor,
    open_scopes: usize,
}

impl Generator {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            out: OutputCursor::new(chunk_size),
            open_scopes: 0,
        }
    }

    pub fn reset(&mut self) {
        self.out.reset();
        self.open_scopes = 0;
    }

    pub fn open_scopes(&self) -> usize {
        self.open_scopes
    }

    // ---- flushing

    /// Move encoded bytes into the chunk; `false` means the chunk is full.
    pub fn drain(&mut self) -> bool {
        self.out.drain()
    }

    pub fn has_pending(&self) -> bool {
        self.out.has_pending()
    }

    pub fn take(&mut self, last: bool) -> OutputChunk {
        self.out.take(last)
    }

    pub fn discard(&mut self) {
        self.out.discard();
        self.open_scopes = 0;
    }

    // ---- tokens

    /// Command id, group id or list id: opens a scope.
    pub fn open(&mut self, id: u32) {
        codec::encode_mbi(id, self.out.pending_mut());
        self.open_scopes += 1;
    }

    /// Instance locator: opens a scope.
    pub fn open_instance(&mut self, instance: &Instance) {
        self.locator(instance);
        self.open_scopes += 1;
    }

    pub fn close(&mut self) {
        codec::encode_marker(Marker::Terminator, self.out.pending_mut());
        self.open_scopes = self.open_scopes.saturating_sub(1);
    }

    pub fn close_all(&mut self) {
        while self.open_scopes > 0 {
            self.close();
        }
    }

    pub fn count(&mut self, count: u32) {
        let buf = self.out.pending_mut();
        codec::encode_marker(Marker::Count, buf);
        codec::encode_mbi(count, buf);
    }

    pub fn removed(&mut self, instance: &Instance) {
        codec::encode_marker(Marker::Remove, self.out.pending_mut());
        self.locator(instance);
    }

    fn locator(&mut self, instance: &Instance) {
        let buf = self.out.pending_mut();
        match instance {
            Instance::Index(index) => codec::encode_mbi(*index, buf),
            Instance::Key(key) => {
                codec::encode_marker(Marker::Key, buf);
                codec::encode_string(key, buf);
            }
        }
    }

    pub fn element_value(&mut self, id: u32, value: &ElementValue) {
        let buf = self.out.pending_mut();
        codec::encode_mbi(id, buf);
        codec::encode_value(value, buf);
    }

    pub fn element_no_value(&mut self, id: u32) {
        let buf = self.out.pending_mut();
        codec::encode_mbi(id, buf);
        codec::encode_marker(Marker::NoValue, buf);
    }

    pub fn element_error(&mut self, id: u32, report: &ErrorReport<'_>) {
        codec::encode_mbi(id, self.out.pending_mut());
        self.error(report);
    }

    pub fn error(&mut self, report: &ErrorReport<'_>) {
        let buf = self.out.pending_mut();
        codec::encode_marker(Marker::Error, buf);
        codec::encode_mbi(report.id, buf);
        for text in [report.description, report.hint] {
            match text {
                Some(text) => codec::encode_string(text, buf),
                None => codec::encode_marker(Marker::NoValue, buf),
            }
        }
    }

    pub fn string(&mut self, text: &str) {
        codec::encode_string(text, self.out.pending_mut());
    }
}
