//! Shared fixtures: a device schema, a byte builder for requests and
//! expected responses, and drivers that pump a session to completion.

use rci_connector::config::{DeviceDescriptor, RciConfig};
use rci_connector::rci::buffer::InputChunk;
use rci_connector::rci::codec::{self, Marker};
use rci_connector::rci::schema::{
    Access, Collection, ElementDef, ErrorDef, GroupDef, ListDef, RciDescriptor, Schema, ValueType,
};
use rci_connector::rci::session::{RciSession, SessionStatus};
use rci_connector::rci::value::{ElementValue, ValueLimit};

use super::mock_handler::MockHandler;

// ── Schema ────────────────────────────────────────────────────

pub const SYSTEM: u32 = 0;
pub const ETH: u32 = 1;
pub const USERS: u32 = 2;
pub const HOSTS: u32 = 3;

pub const ETH_MTU: u32 = 0;
pub const ETH_PASSWORD: u32 = 1;
pub const ETH_MAC: u32 = 2;
pub const ETH_ROUTES: u32 = 3;

pub const STATS: u32 = 0;

/// Group error ids start after the six protocol and one user global error.
pub const INVALID_MTU: u32 = 8;

pub fn descriptor() -> RciDescriptor {
    let routes = ListDef {
        collection: Collection::VariableArray { dont_shrink: false },
        elements: vec![
            ElementDef::new("gateway", ValueType::Ipv4, Access::ReadWrite),
            ElementDef::new("metric", ValueType::Uint32, Access::ReadWrite),
        ],
    };
    let setting = vec![
        GroupDef::new(
            "system",
            Collection::FixedArray(1),
            vec![
                ElementDef::new("description", ValueType::String, Access::ReadWrite),
                ElementDef::new("contact", ValueType::String, Access::ReadWrite),
                ElementDef::new("location", ValueType::String, Access::ReadWrite),
            ],
        ),
        GroupDef::new(
            "eth",
            Collection::FixedArray(2),
            vec![
                ElementDef::new("mtu", ValueType::Uint32, Access::ReadWrite)
                    .with_limit(ValueLimit::Unsigned { min: 576, max: 1500 }),
                ElementDef::new("password", ValueType::Password, Access::WriteOnly),
                ElementDef::new("mac", ValueType::MacAddr, Access::ReadOnly),
                ElementDef::list("routes", routes),
            ],
        )
        .with_errors(vec![ErrorDef::new("invalid_mtu", "MTU out of range")]),
        GroupDef::new(
            "users",
            Collection::VariableDictionary { dont_shrink: false },
            vec![
                ElementDef::new("name", ValueType::String, Access::ReadWrite),
                ElementDef::new("level", ValueType::Enum, Access::ReadWrite)
                    .with_limit(ValueLimit::Enum { count: 3 }),
            ],
        ),
        GroupDef::new(
            "hosts",
            Collection::VariableArray { dont_shrink: true },
            vec![ElementDef::new("host", ValueType::FqdnV4, Access::ReadWrite)],
        ),
    ];
    let state = vec![GroupDef::new(
        "device_stats",
        Collection::FixedArray(1),
        vec![
            ElementDef::new("uptime", ValueType::Uint32, Access::ReadOnly),
            ElementDef::new("free_memory", ValueType::Uint32, Access::ReadOnly),
        ],
    )];
    RciDescriptor::new(
        DeviceDescriptor {
            vendor_id: 0x0300_0000,
            firmware_target_zero_version: 0x0100_0000,
        },
        vec![ErrorDef::new("load_failed", "Load failed")],
        Schema { setting, state },
    )
    .unwrap()
}

// ── Byte builder ──────────────────────────────────────────────

/// Builds requests and expected responses token by token.
#[derive(Debug, Clone, Default)]
pub struct Bytes(Vec<u8>);

#[allow(dead_code)]
impl Bytes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mbi(mut self, value: u32) -> Self {
        codec::encode_mbi(value, &mut self.0);
        self
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        codec::encode_marker(marker, &mut self.0);
        self
    }

    pub fn end(self) -> Self {
        self.marker(Marker::Terminator)
    }

    pub fn no_value(self) -> Self {
        self.marker(Marker::NoValue)
    }

    pub fn string(mut self, text: &str) -> Self {
        codec::encode_string(text, &mut self.0);
        self
    }

    pub fn value(mut self, value: &ElementValue) -> Self {
        codec::encode_value(value, &mut self.0);
        self
    }

    pub fn key(self, key: &str) -> Self {
        self.marker(Marker::Key).string(key)
    }

    pub fn count(self, n: u32) -> Self {
        self.marker(Marker::Count).mbi(n)
    }

    pub fn error(self, id: u32, description: Option<&str>, hint: Option<&str>) -> Self {
        let mut out = self.marker(Marker::Error).mbi(id);
        for text in [description, hint] {
            out = match text {
                Some(text) => out.string(text),
                None => out.no_value(),
            };
        }
        out
    }

    pub fn build(self) -> Vec<u8> {
        self.0
    }
}

// ── Drivers ───────────────────────────────────────────────────

/// Loop guard; no test request needs anywhere near this many resumes.
const MAX_RESUMES: usize = 10_000;

#[derive(Debug)]
pub struct Outcome {
    pub status: SessionStatus,
    pub output: Vec<u8>,
    pub flushes: usize,
    pub busy: usize,
}

/// Feed `chunks` one after another, draining output and retrying busy
/// callbacks until the session reaches a terminal status.
pub fn run_chunks(
    desc: &RciDescriptor,
    config: &RciConfig,
    handler: &mut MockHandler,
    chunks: &[&[u8]],
) -> Outcome {
    let mut session = RciSession::new(1, config);
    let mut outcome = Outcome {
        status: SessionStatus::InternalError,
        output: Vec::new(),
        flushes: 0,
        busy: 0,
    };
    let chunk = |i: usize| InputChunk {
        data: chunks[i],
        first: i == 0,
        last: i + 1 == chunks.len(),
    };
    let mut next = 1;
    let mut status = session.start(desc, handler, chunk(0));
    for _ in 0..MAX_RESUMES {
        status = match status {
            SessionStatus::FlushOutput => {
                outcome.flushes += 1;
                outcome.output.extend(session.take_output().data);
                session.resume(desc, handler, None)
            }
            SessionStatus::Busy => {
                outcome.busy += 1;
                session.resume(desc, handler, None)
            }
            SessionStatus::NeedMoreInput if next < chunks.len() => {
                next += 1;
                session.resume(desc, handler, Some(chunk(next - 1)))
            }
            SessionStatus::Complete => {
                outcome.output.extend(session.take_output().data);
                break;
            }
            _ => break,
        };
    }
    outcome.status = status;
    outcome
}

pub fn run(desc: &RciDescriptor, handler: &mut MockHandler, request: &[u8]) -> Outcome {
    run_chunks(desc, &RciConfig::default(), handler, &[request])
}
