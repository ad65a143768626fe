//! Best-effort conversion of arbitrary JSON objects into [`Record`]s.
//!
//! Applied to every imported document, in this order:
//!
//! 1. A missing or falsy `id` is generated.
//! 2. A missing or falsy `type` becomes the configured category.
//! 3. A missing or falsy `label` becomes the configured label.
//! 4. A document without a `fields` object is a legacy flat ticket: the
//!    whole document, *including* the `id`, `type` and `label` filled in by
//!    steps 1-3, becomes the field map, and the record is rebuilt around it
//!    from `id`, `type`, `label`, `createdAt`, `updatedAt` and `date`.
//!
//! "Falsy" means absent, `null`, `false`, `0` or the empty string.
//!
//! Values that are not one of the three allowed field shapes are coerced:
//! numbers become their decimal text, nested objects become compact JSON
//! text, array elements become strings, and `null` drops the key.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::record::{FieldMap, FieldValue, Record, parse_date, parse_timestamp};

/// Defaults applied to documents that omit parts of the record shape.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeDefaults<'a> {
    pub category: &'a str,
    pub label: &'a str,
    pub now: DateTime<Utc>,
}

/// Turn an imported JSON object into a record.
///
/// `new_id` is called only when the document carries no usable `id`; it
/// must return an id no stored record uses.
pub fn normalize_document(
    mut doc: Map<String, Value>,
    defaults: NormalizeDefaults<'_>,
    new_id: impl FnOnce() -> String,
) -> Record {
    let id = match truthy_text(doc.get("id")) {
        Some(id) => id,
        None => {
            let id = new_id();
            doc.insert("id".into(), Value::String(id.clone()));
            id
        }
    };
    let kind = truthy_text(doc.get("type")).unwrap_or_else(|| {
        doc.insert("type".into(), Value::String(defaults.category.into()));
        defaults.category.to_string()
    });
    let label = truthy_text(doc.get("label")).unwrap_or_else(|| {
        doc.insert("label".into(), Value::String(defaults.label.into()));
        defaults.label.to_string()
    });

    let created_at = timestamp_or(&doc, "createdAt", defaults.now);
    let updated_at = timestamp_or(&doc, "updatedAt", defaults.now);
    let date = truthy_text(doc.get("date")).and_then(|raw| {
        let parsed = parse_date(&raw);
        if parsed.is_none() {
            warn!(id = %id, date = %raw, "dropping unparsable ticket date");
        }
        parsed
    });

    let structured = match doc.get("fields") {
        Some(Value::Object(_)) => true,
        Some(other) => is_truthy(other),
        None => false,
    };
    if !structured {
        // Legacy flat document: the top level is the field map.
        return Record {
            id,
            kind,
            label,
            created_at,
            updated_at,
            date,
            secondary_id: String::new(),
            fields: to_field_map(doc),
        };
    }

    let fields = match doc.remove("fields") {
        Some(Value::Object(map)) => to_field_map(map),
        _ => {
            warn!(id = %id, "ticket `fields` is not an object, treating as empty");
            FieldMap::new()
        }
    };

    let secondary_id = truthy_text(doc.get("ticketId")).unwrap_or_default();

    Record {
        id,
        kind,
        label,
        created_at,
        updated_at,
        date,
        secondary_id,
        fields,
    }
}

fn timestamp_or(doc: &Map<String, Value>, key: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = truthy_text(doc.get(key)) else {
        return now;
    };
    parse_timestamp(&raw).unwrap_or_else(|| {
        warn!(key, value = %raw, "unparsable timestamp, using now");
        now
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text of a truthy scalar; `None` for falsy values.
fn truthy_text(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if !is_truthy(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn to_field_map(map: Map<String, Value>) -> FieldMap {
    map.into_iter()
        .filter_map(|(key, value)| to_field_value(value).map(|v| (key, v)))
        .collect()
}

fn to_field_value(value: Value) -> Option<FieldValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::Bool(b)),
        Value::String(s) => Some(FieldValue::Text(s)),
        Value::Number(n) => Some(FieldValue::Text(n.to_string())),
        Value::Array(items) => Some(FieldValue::List(
            items
                .into_iter()
                .filter(|item| !item.is_null())
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        )),
        obj @ Value::Object(_) => Some(FieldValue::Text(obj.to_string())),
    }
}
