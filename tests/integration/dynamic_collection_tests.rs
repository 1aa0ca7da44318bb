//! Variable arrays and dictionaries: locking, count negotiation, growth
//! and removal.

use rci_connector::rci::codec::Marker;
use rci_connector::rci::cursor::Instance;
use rci_connector::rci::session::SessionStatus;
use rci_connector::rci::value::ElementValue;

use super::harness::*;
use super::mock_handler::MockHandler;

const SET_SETTING: u32 = 1;
const QUERY_SETTING: u32 = 3;

#[test]
fn set_count_resizes_array_before_instances() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    let request = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(HOSTS)
        .count(2)
        .mbi(1)
        .mbi(0)
        .string("a.example.com")
        .end()
        .mbi(2)
        .mbi(0)
        .string("b.example.com")
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
            "group_instances_lock",
            "group_instances_set",
            "element_process",
            "element_process",
            "group_instances_unlock",
            "group_end",
            "action_end",
            "session_end",
        ]
    );
    assert_eq!(handler.calls[4].count, Some(2));
    assert_eq!(handler.counts.get(&vec![HOSTS]), Some(&2));

    let expected = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(HOSTS)
        .count(2)
        .mbi(1)
        .mbi(0)
        .no_value()
        .end()
        .mbi(2)
        .mbi(0)
        .no_value()
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn larger_count_is_accepted_when_collection_does_not_shrink() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler.offered_count = Some(3);
    let request = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(HOSTS)
        .count(1)
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    let expected = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(HOSTS)
        .count(3)
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn mismatched_count_collapses_to_empty() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler.offered_count = Some(3);
    // routes may shrink, so an offer other than the request is refused
    let request = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(ETH)
        .mbi(1)
        .mbi(ETH_ROUTES)
        .count(1)
        .end()
        .end()
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.count_of("list_instances_set"), 1);
    let expected = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(ETH)
        .mbi(1)
        .mbi(ETH_ROUTES)
        .count(0)
        .end()
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn setting_past_the_end_grows_the_array() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    let request = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(HOSTS)
        .mbi(1)
        .mbi(0)
        .string("c.example.com")
        .end()
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    let grow = handler
        .calls
        .iter()
        .find(|c| c.name == "group_instances_set")
        .and_then(|c| c.count);
    assert_eq!(grow, Some(1));
    assert_eq!(handler.count_of("element_process"), 1);
}

#[test]
fn new_dictionary_key_is_created_on_set() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    let request = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(USERS)
        .key("ops")
        .mbi(0)
        .string("Operations")
        .end()
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    let created = handler
        .calls
        .iter()
        .find(|c| c.name == "group_instances_set")
        .cloned();
    assert_eq!(created.as_ref().and_then(|c| c.count), Some(1));
    assert_eq!(
        created.and_then(|c| c.instance),
        Some(Instance::Key("ops".into()))
    );
    assert_eq!(handler.keys.get(&vec![USERS]), Some(&vec!["ops".to_string()]));

    let expected = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(USERS)
        .key("ops")
        .mbi(0)
        .no_value()
        .end()
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn remove_by_key_is_echoed() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler
        .keys
        .insert(vec![USERS], vec!["admin".into(), "guest".into()]);
    let request = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(USERS)
        .marker(Marker::Remove)
        .key("guest")
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.count_of("group_instance_remove"), 1);
    assert_eq!(handler.keys.get(&vec![USERS]), Some(&vec!["admin".to_string()]));
    let expected = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(USERS)
        .marker(Marker::Remove)
        .key("guest")
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn remove_by_index_from_array() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler.counts.insert(vec![HOSTS], 2);
    let request = Bytes::new()
        .mbi(SET_SETTING)
        .mbi(HOSTS)
        .marker(Marker::Remove)
        .mbi(2)
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.counts.get(&vec![HOSTS]), Some(&1));
    let removed = handler
        .calls
        .iter()
        .find(|c| c.name == "group_instance_remove")
        .and_then(|c| c.instance.clone());
    assert_eq!(removed, Some(Instance::Index(2)));
}

#[test]
fn every_lock_is_paired_with_an_unlock() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler.default_value = Some("v".into());
    handler.values.insert(
        (vec![ETH], ETH_MTU),
        ElementValue::Unsigned(1500),
    );
    handler.counts.insert(vec![ETH, ETH_ROUTES], 2);
    handler.values.insert(
        (vec![ETH, ETH_ROUTES], 0),
        ElementValue::Ipv4([10, 0, 0, 1].into()),
    );
    handler.values.insert(
        (vec![ETH, ETH_ROUTES], 1),
        ElementValue::Unsigned(1),
    );
    handler.keys.insert(vec![USERS], vec!["admin".into()]);
    handler
        .values
        .insert((vec![USERS], 1), ElementValue::Enum(0));
    handler.counts.insert(vec![HOSTS], 1);

    let request = Bytes::new().mbi(QUERY_SETTING).end().build();
    let outcome = run(&desc, &mut handler, &request);
    assert_eq!(outcome.status, SessionStatus::Complete);

    let mut open: Vec<Vec<u32>> = Vec::new();
    let mut locks = 0;
    for call in &handler.calls {
        match call.name {
            "group_instances_lock" | "list_instances_lock" => {
                assert!(!open.contains(&call.path), "double lock of {:?}", call.path);
                open.push(call.path.clone());
                locks += 1;
            }
            "group_instances_unlock" | "list_instances_unlock" => {
                assert_eq!(open.pop().as_ref(), Some(&call.path), "unlock out of order");
            }
            "group_start" | "group_end" => assert!(open.is_empty(), "lock leaked across groups"),
            _ => {}
        }
    }
    assert!(open.is_empty());
    // routes once per eth instance, users, hosts
    assert_eq!(locks, 4);
}

#[test]
fn query_cannot_edit_collections() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    let request = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(HOSTS)
        .count(4)
        .end()
        .end()
        .build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.count_of("group_instances_lock"), 0);
    let expected = Bytes::new()
        .mbi(QUERY_SETTING)
        .mbi(HOSTS)
        .error(1, Some("Bad command"), None)
        .end()
        .end()
        .build();
    assert_eq!(outcome.output, expected);
}

#[test]
fn failed_lock_is_still_unlocked() {
    let desc = descriptor();
    let mut handler = MockHandler::new();
    handler.errors.insert("list_instances_lock", (7, None));
    let request = Bytes::new().mbi(QUERY_SETTING).mbi(ETH).end().end().build();

    let outcome = run(&desc, &mut handler, &request);

    assert_eq!(outcome.status, SessionStatus::Complete);
    assert_eq!(handler.count_of("list_instances_lock"), 1);
    assert_eq!(handler.count_of("list_instances_unlock"), 1);
    let names = handler.names();
    let unlock = names.iter().position(|n| *n == "list_instances_unlock");
    let end = names.iter().position(|n| *n == "list_end");
    assert!(unlock.is_some() && unlock < end, "unlock before list_end: {:?}", names);
}
