//! do_command, reboot and set_factory_default.

use rci_connector::config::RciConfig;
use rci_connector::rci::parser::ATTRIBUTE_FLAG;
use rci_connector::rci::session::SessionStatus;

use super::harness::*;
use super::mock_handler::MockHandler;

const DO_COMMAND: u32 = 6;
const REBOOT: u32 = 7;
const SET_FACTORY_DEFAULT: u32 = 8;

fn do_command(target: &str, payload: &str) -> Vec<u8> {
    Bytes::new()
        .mbi(DO_COMMAND | ATTRIBUTE_FLAG)
        .mbi(1)
        .mbi(0)
        .string(target)
        .string(payload)
        .build()
}

#[test]
fn do_command_passes_target_and_payload() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler.payload = Some("pong".into());

    let outcome = run(&desc, &mut handler, &do_command("ping", "<ping count=\"1\"/>"));

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.names(), ["session_start", "do_command", "session_end"]);
    assert_eq!(handler.do_command_targets, [Some("ping".to_string())]);
    assert_eq!(handler.do_command_payloads, ["<ping count=\"1\"/>".to_string()]);
    let expected = Bytes::new().mbi(DO_COMMAND).string("pong").end().build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn do_command_without_target() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    let request = Bytes::new().mbi(DO_COMMAND).string("status").build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.do_command_targets, [None]);
    let expected = Bytes::new().mbi(DO_COMMAND).string("").end().build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn failed_do_command_reports_command_failed() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler
        .errors
        .insert("do_command", (7, Some("no such target".into())));

    let outcome = run(&desc, &mut handler, &do_command("zigbee", ""));

    assert_eq!(outcome.status, SessionStatus::Complete);
    let expected = Bytes::new()
        .mbi(DO_COMMAND)
        .error(4, Some("Command failed"), Some("no such target"))
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn oversized_target_is_bad_value() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    let target = "t".repeat(40);

    let outcome = run(&desc, &mut handler, &do_command(&target, ""));

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.count_of("do_command"), 0);
    let expected = Bytes::new()
        .mbi(DO_COMMAND)
        .error(3, Some("Bad value"), None)
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn reboot_acknowledges_with_empty_response() {
    let desc = descriptor();
    let mut handler = MockHandler::new();

    let outcome = run(&desc, &mut handler, &Bytes::new().mbi(REBOOT).build());

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.names(), ["session_start", "reboot", "session_end"]);
    assert_eq!(outcome.output, Bytes::new().mbi(REBOOT).end().build());
}

#[test]
fn failed_reboot_reports_reboot_failed() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler.errors.insert("reboot", (7, None));

    let outcome = run(&desc, &mut handler, &Bytes::new().mbi(REBOOT).build());

    let expected = Bytes::new()
        .mbi(REBOOT)
        .error(5, Some("Reboot failed"), None)
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn set_factory_default_then_query() {
    let desc = descriptor();
    let mut handler = MockHandler::answering("x");
    let request = Bytes::new()
        .mbi(SET_FACTORY_DEFAULT)
        .mbi(3)
        .mbi(SYSTEM)
        .mbi(1)
        .mbi(0)
        .end()
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.count_of("set_factory_default"), 1);
    let expected = Bytes::new()
        .mbi(SET_FACTORY_DEFAULT)
        .end()
        .mbi(3)
        .mbi(SYSTEM)
        .mbi(1)
        .mbi(0)
        .string("x")
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn failed_factory_default_reports_its_error() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler
        .errors
        .insert("set_factory_default", (7, Some("flash locked".into())));

    let outcome = run(&desc, &mut handler, &Bytes::new().mbi(SET_FACTORY_DEFAULT).build());

    let expected = Bytes::new()
        .mbi(SET_FACTORY_DEFAULT)
        .error(6, Some("Set factory default failed"), Some("flash locked"))
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn legacy_commands_can_be_disabled() {
    let desc = descriptor();
    let config = RciConfig {
        legacy_commands: false,
        ..RciConfig::default()
    };
    let mut handler = MockHandler::new();
    let request = Bytes::new().mbi(REBOOT).build();

    let outcome = run_chunks(&desc, &config, &mut handler, &[&request]);

    assert_eq!(handler.count_of("reboot"), 0);
    assert_eq!(
        outcome.output,
        Bytes::new().error(1, Some("Bad command"), None).build()
    );
}
