//! Query actions: framing, element order, access rules, compare-to.

use std::net::Ipv4Addr;

use rci_connector::rci::parser::ATTRIBUTE_FLAG;
use rci_connector::rci::session::SessionStatus;
use rci_connector::rci::value::ElementValue;

use super::harness::*;
use super::mock_handler::MockHandler;

const QUERY_SETTING: u32 = 3;
const QUERY_STATE: u32 = 4;

fn eth_handler() -> MockHandler {
    let mut handler = MockHandler::new();
    handler
        .values
        .insert((vec![ETH], ETH_MTU), ElementValue::Unsigned(1500));
    handler
        .values
        .insert((vec![ETH], ETH_MAC), "00:40:9D:00:00:01".into());
    handler.counts.insert(vec![ETH, ETH_ROUTES], 1);
    handler.values.insert(
        (vec![ETH, ETH_ROUTES], 0),
        ElementValue::Ipv4(Ipv4Addr::new(192, 168, 1, 1)),
    );
    handler
        .values
        .insert((vec![ETH, ETH_ROUTES], 1), ElementValue::Unsigned(10));
    handler
}

#[test]
fn fixed_group_query_returns_every_element_in_order() {
    let desc = descriptor();
    let mut handler = MockHandler::answering("x");
    let request = Bytes::new().mbi(QUERY_SETTING).mbi(SYSTEM).end().end().build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(
        handler.names(),
        [
            "session_start",
            "action_start",
            "group_start",
            "element_process",
            "element_process",
            "element_process",
            "group_end",
            "action_end",
            "session_end",
        ]
    );
    assert_eq!(handler.elements_processed(), [0, 1, 2]);

    let expected = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(SYSTEM)
        .mbi(1)
        .mbi(0)
        .string("x")
        .mbi(1)
        .string("x")
        .mbi(2)
        .string("x")
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn requested_elements_only() {
    let desc = descriptor();
    let mut handler = MockHandler::answering("here");
    let request = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(SYSTEM)
        .mbi(1)
        .mbi(2)
        .end()
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.elements_processed(), [2]);
    let expected = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(SYSTEM)
        .mbi(1)
        .mbi(2)
        .string("here")
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn write_only_elements_are_never_queried() {
    let desc = descriptor();
    let mut handler = eth_handler();
    let request = Bytes::new().mbi(QUERY_SETTING).mbi(ETH).end().end().build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert!(
        !handler.elements_processed_at(&[ETH]).contains(&ETH_PASSWORD),
        "password is write-only"
    );
    // two instances, each with mtu, mac and one route (gateway, metric)
    assert_eq!(handler.count_of("element_process"), 2 * (2 + 2));
}

#[test]
fn explicit_write_only_request_is_skipped_silently() {
    let desc = descriptor();
    let mut handler = eth_handler();
    let request = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(ETH)
        .mbi(1)
        .mbi(ETH_PASSWORD)
        .end()
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.count_of("element_process"), 0);
    let expected = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(ETH)
        .mbi(1)
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn nested_list_is_locked_counted_and_unlocked() {
    let desc = descriptor();
    let mut handler = eth_handler();
    let request = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(ETH)
        .mbi(2)
        .mbi(ETH_ROUTES)
        .end()
        .end()
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(
        handler.names(),
        [
            "session_start",
            "action_start",
            "group_start",
            "list_start",
            "list_instances_lock",
            "element_process",
            "element_process",
            "list_instances_unlock",
            "list_end",
            "group_end",
            "action_end",
            "session_end",
        ]
    );
    let routes = handler
        .calls
        .iter()
        .find(|c| c.name == "list_instances_lock")
        .map(|c| c.path.clone());
    assert_eq!(routes, Some(vec![ETH, ETH_ROUTES]));

    let expected = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(ETH)
        .mbi(2)
        .mbi(ETH_ROUTES)
        .count(1)
        .mbi(1)
        .mbi(0)
        .value(&ElementValue::Ipv4(Ipv4Addr::new(192, 168, 1, 1)))
        .mbi(1)
        .mbi(10)
        .end()
        .end()
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn empty_dictionary_goes_straight_from_start_to_end() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    let request = Bytes::new().mbi(QUERY_SETTING).mbi(USERS).end().end().build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(
        handler.names(),
        [
            "session_start",
            "action_start",
            "group_start",
            "group_instances_lock",
            "group_instances_unlock",
            "group_end",
            "action_end",
            "session_end",
        ]
    );
    let expected = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(USERS)
        .count(0)
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn dictionary_instances_are_addressed_by_key() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler
        .keys
        .insert(vec![USERS], vec!["admin".into(), "guest".into()]);
    handler.values.insert((vec![USERS], 0), "n".into());
    handler.values.insert((vec![USERS], 1), ElementValue::Enum(2));
    let request = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(USERS)
        .key("guest")
        .mbi(1)
        .end()
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    let expected = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(USERS)
        .count(2)
        .key("guest")
        .mbi(1)
        .mbi(2)
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn query_without_groups_walks_every_group() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler.default_value = Some(ElementValue::Unsigned(42));
    let request = Bytes::new().mbi(QUERY_STATE).end().build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    let expected = Bytes::new()
        .mbi(QUERY_STATE)
        .mbi(STATS)
        .mbi(1)
        .mbi(0)
        .mbi(42)
        .mbi(1)
        .mbi(42)
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn missing_value_is_sent_as_no_value() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    let request = Bytes::new()
        .mbi(QUERY_STATE)
        .mbi(STATS)
        .mbi(1)
        .mbi(0)
        .end()
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    let expected = Bytes::new()
        .mbi(QUERY_STATE)
        .mbi(STATS)
        .mbi(1)
        .mbi(0)
        .no_value()
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn wrongly_typed_value_is_an_internal_error() {
    let desc = descriptor();
    let mut handler = MockHandler::answering("not a number");
    let request = Bytes::new().mbi(QUERY_STATE).mbi(STATS).end().end().build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::InternalError);
}

// ── compare_to ────────────────────────────────────────────────

fn compare_to_current(group: u32) -> Vec<u8> {
    Bytes::new()
        .mbi(QUERY_SETTING | ATTRIBUTE_FLAG)
        .mbi(1)
        .mbi(1) // compare_to
        .mbi(1) // current
        .mbi(group)
        .end()
        .end()
        .build()
}

#[test]
fn matching_element_is_left_out() {
    let desc = descriptor();
    let mut handler = MockHandler::answering("x");
    handler.matching_elements.insert(1);

    let outcome = run(&desc, &mut handler, &compare_to_current(SYSTEM));

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.elements_processed(), [0, 1, 2]);
    let expected = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(SYSTEM)
        .mbi(1)
        .mbi(0)
        .string("x")
        .mbi(2)
        .string("x")
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn matching_collection_skips_its_subtree() {
    let desc = descriptor();
    let mut handler = MockHandler::answering("x");
    handler.matching_collections.insert(SYSTEM);

    let outcome = run(&desc, &mut handler, &compare_to_current(SYSTEM));

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.count_of("element_process"), 0);
    assert_eq!(handler.count_of("group_end"), 1, "end still pairs with start");
    let expected = Bytes::new().mbi(QUERY_SETTING).end().build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn compare_matches_are_ignored_without_compare_to() {
    let desc = descriptor();
    let mut handler = MockHandler::answering("x");
    handler.matching_elements.insert(1);
    let request = Bytes::new().mbi(QUERY_SETTING).mbi(SYSTEM).end().end().build();

    run(&desc, &mut handler, &request);

    assert_eq!(handler.count_of("element_process"), 3);
}
