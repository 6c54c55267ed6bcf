//! Tests for the flatten engine

use crate::event::{Event, LeafValue};
use crate::flatten::{flatten, unflatten};
use crate::{MAX_DEPTH, ProtocolError};

fn paths(event: &Event) -> Vec<String> {
    flatten(event).unwrap().into_iter().map(|(p, _)| p).collect()
}

fn checkout() -> Event {
    Event::builder()
        .field("EventName", "Checkout")
        .field(
            "order",
            Event::builder()
                .field("id", 7_i64)
                .field(
                    "items",
                    Event::sequence([
                        Event::builder().field("sku", "A-1").field("qty", 2_i32).build(),
                        Event::builder().field("sku", "B-2").field("qty", 1_i32).build(),
                    ]),
                )
                .build(),
        )
        .field("tags", Event::sequence(["new", "mobile"]))
        .build()
}

// =============================================================================
// Flatten
// =============================================================================

#[test]
fn test_flatten_paths_in_source_order() {
    assert_eq!(
        paths(&checkout()),
        vec![
            "EventName",
            "order.id",
            "order.items[0].sku",
            "order.items[0].qty",
            "order.items[1].sku",
            "order.items[1].qty",
            "tags[0]",
            "tags[1]",
        ]
    );
}

#[test]
fn test_flatten_values_kept() {
    let fields = flatten(&checkout()).unwrap();
    assert_eq!(fields[0].1, LeafValue::String("Checkout".into()));
    assert_eq!(fields[3].1, LeafValue::I32(2));
    assert_eq!(fields[7].1, LeafValue::String("mobile".into()));
}

#[test]
fn test_flatten_root_leaf_has_empty_path() {
    let fields = flatten(&Event::from(5_u8)).unwrap();
    assert_eq!(fields, vec![(String::new(), LeafValue::U8(5))]);
}

#[test]
fn test_flatten_root_sequence() {
    let event = Event::sequence([1_i32, 2, 3]);
    assert_eq!(paths(&event), vec!["[0]", "[1]", "[2]"]);
}

#[test]
fn test_flatten_nested_sequences() {
    let event = Event::builder()
        .field("grid", Event::sequence([Event::sequence([1_i32, 2]), Event::sequence([3_i32])]))
        .build();
    assert_eq!(paths(&event), vec!["grid[0][0]", "grid[0][1]", "grid[1][0]"]);
}

#[test]
fn test_flatten_empty_containers_emit_nothing() {
    let event = Event::builder()
        .field("empty", Event::object(Vec::<(String, Event)>::new()))
        .field("none", Event::Sequence(vec![]))
        .field("x", true)
        .build();
    assert_eq!(paths(&event), vec!["x"]);
}

#[test]
fn test_flatten_depth_guard() {
    let mut event = Event::from(1_i32);
    for _ in 0..=MAX_DEPTH {
        event = Event::builder().field("n", event).build();
    }
    let err = flatten(&event).unwrap_err();
    assert!(matches!(err, ProtocolError::CycleDetected { .. }));
}

#[test]
fn test_flatten_at_depth_limit_succeeds() {
    let mut event = Event::from(1_i32);
    for _ in 0..MAX_DEPTH {
        event = Event::builder().field("n", event).build();
    }
    assert_eq!(flatten(&event).unwrap().len(), 1);
}

// =============================================================================
// Unflatten
// =============================================================================

#[test]
fn test_unflatten_inverts_flatten() {
    let event = checkout();
    let rebuilt = unflatten(flatten(&event).unwrap()).unwrap();
    assert_eq!(rebuilt, event);
}

#[test]
fn test_unflatten_root_sequence() {
    let event = Event::sequence(["a", "b"]);
    assert_eq!(unflatten(flatten(&event).unwrap()).unwrap(), event);
}

#[test]
fn test_unflatten_empty_is_empty_object() {
    assert_eq!(unflatten(Vec::new()).unwrap(), Event::Object(vec![]));
}

#[test]
fn test_unflatten_rejects_index_gap() {
    let err = unflatten(vec![("a[1]".to_string(), LeafValue::I32(1))]).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidPayload(_)));
}

#[test]
fn test_unflatten_rejects_duplicate_path() {
    let err = unflatten(vec![
        ("a".to_string(), LeafValue::I32(1)),
        ("a".to_string(), LeafValue::I32(2)),
    ])
    .unwrap_err();
    assert!(err.to_string().contains("duplicate path"));
}

#[test]
fn test_unflatten_rejects_conflicting_shapes() {
    let err = unflatten(vec![
        ("a.b".to_string(), LeafValue::I32(1)),
        ("a[0]".to_string(), LeafValue::I32(2)),
    ])
    .unwrap_err();
    assert!(err.to_string().contains("conflicts"));
}

#[test]
fn test_unflatten_rejects_bad_paths() {
    for path in ["a..b", "a[x]", "a[0", "a.", ".a"] {
        let result = unflatten(vec![(path.to_string(), LeafValue::Bool(true))]);
        assert!(result.is_err(), "path {path:?} should be rejected");
    }
}
