//! Fuzz target: `RciSession` over arbitrary requests
//!
//! The first input byte picks where the request is split in two and the
//! output chunk size; the rest is the request. Every run must reach a
//! terminal status without panicking, and a completed session must have
//! closed what it opened.
//!
//! cargo fuzz run fuzz_request_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use rci_connector::config::{DeviceDescriptor, RciConfig};
use rci_connector::rci::buffer::InputChunk;
use rci_connector::rci::callback::{CallbackRequest, CallbackResponse, CallbackStatus};
use rci_connector::rci::schema::{Access, Collection, ElementDef, GroupDef, ListDef, RciDescriptor, Schema, ValueType};
use rci_connector::rci::session::{RciSession, SessionStatus};
use rci_connector::rci::value::ElementValue;

/// Bounds the driver loop on pathological requests.
const MAX_STEPS: usize = 100_000;

fn descriptor() -> Option<RciDescriptor> {
    let slots = ListDef {
        collection: Collection::VariableArray { dont_shrink: false },
        elements: vec![ElementDef::new("slot", ValueType::Int32, Access::ReadWrite)],
    };
    let setting = vec![
        GroupDef::new(
            "serial",
            Collection::FixedArray(2),
            vec![
                ElementDef::new("baud", ValueType::Uint32, Access::ReadWrite),
                ElementDef::new("name", ValueType::String, Access::ReadOnly),
                ElementDef::list("slots", slots),
            ],
        ),
        GroupDef::new(
            "aliases",
            Collection::VariableDictionary { dont_shrink: false },
            vec![ElementDef::new("target", ValueType::FqdnV4, Access::ReadWrite)],
        ),
    ];
    RciDescriptor::new(
        DeviceDescriptor {
            vendor_id: 1,
            firmware_target_zero_version: 1,
        },
        Vec::new(),
        Schema {
            setting,
            state: Vec::new(),
        },
    )
    .ok()
}

fuzz_target!(|data: &[u8]| {
    let Some((&control, request)) = data.split_first() else {
        return;
    };
    let Some(desc) = descriptor() else {
        return;
    };
    let config = RciConfig {
        output_chunk_size: 1 + usize::from(control & 0x0F),
        ..RciConfig::default()
    };
    let cut = usize::from(control >> 4).min(request.len());
    let chunks = [&request[..cut], &request[cut..]];

    let mut locks = 0i32;
    let mut handler = |call: &CallbackRequest<'_>, response: &mut CallbackResponse| {
        match call {
            CallbackRequest::GroupInstancesLock(_) | CallbackRequest::ListInstancesLock(_) => {
                locks += 1;
                response.set_count(1);
                response.set_keys(["home"]);
            }
            CallbackRequest::GroupInstancesUnlock(_) | CallbackRequest::ListInstancesUnlock(_) => locks -= 1,
            CallbackRequest::ElementProcess(element) if element.value.is_none() => {
                response.value = match element.value_type {
                    ValueType::Int32 => Some(ElementValue::Signed(-1)),
                    ValueType::Uint32 => Some(ElementValue::Unsigned(9600)),
                    _ => Some(ElementValue::from("x")),
                };
            }
            _ => {}
        }
        CallbackStatus::Continue
    };

    let mut session = RciSession::new(1, &config);
    let mut status = session.start(
        &desc,
        &mut handler,
        InputChunk {
            data: chunks[0],
            first: true,
            last: false,
        },
    );
    let mut fed = false;
    for _ in 0..MAX_STEPS {
        status = match status {
            SessionStatus::FlushOutput => {
                let chunk = session.take_output();
                assert!(chunk.data.len() <= config.output_chunk_size);
                session.resume(&desc, &mut handler, None)
            }
            SessionStatus::NeedMoreInput if !fed => {
                fed = true;
                let last = InputChunk {
                    data: chunks[1],
                    first: false,
                    last: true,
                };
                session.resume(&desc, &mut handler, Some(last))
            }
            _ => break,
        };
    }
    assert!(status.is_terminal(), "session stuck in {status:?}");
    if status == SessionStatus::Complete {
        assert_eq!(locks, 0, "lock without unlock");
    }
});
