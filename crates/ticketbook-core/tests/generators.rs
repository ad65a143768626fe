//! Shared proptest strategies for ticketbook-core integration tests.

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use ticketbook_core::record::{FieldMap, FieldValue};

pub fn arb_field_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        any::<bool>().prop_map(FieldValue::Bool),
        "[ -~]{0,16}".prop_map(FieldValue::Text),
        prop::collection::vec("[a-z]{1,6}", 0..4).prop_map(FieldValue::List),
    ]
}

/// A form snapshot: field names to allowed values.
pub fn arb_fields() -> impl Strategy<Value = FieldMap> {
    prop::collection::btree_map("[a-z_]{1,10}", arb_field_value(), 0..8)
}

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[ -~]{0,12}".prop_map(Value::String),
    ]
}

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("id".to_string()),
        Just("type".to_string()),
        Just("label".to_string()),
        Just("createdAt".to_string()),
        Just("updatedAt".to_string()),
        Just("date".to_string()),
        Just("ticketId".to_string()),
        "[a-z]{1,8}".prop_filter("fields is generated separately", |k| k != "fields"),
    ]
}

/// An arbitrary import document, flat or with a nested `fields` object.
pub fn arb_document() -> impl Strategy<Value = Map<String, Value>> {
    (
        prop::collection::btree_map(arb_key(), arb_leaf(), 0..8),
        proptest::option::of(prop::collection::btree_map("[a-z]{1,6}", arb_leaf(), 0..4)),
    )
        .prop_map(|(top, fields)| {
            let mut doc: Map<String, Value> = top.into_iter().collect();
            if let Some(fields) = fields {
                doc.insert("fields".into(), Value::Object(fields.into_iter().collect()));
            }
            doc
        })
}
