//! The ticket record and its open field map.
//!
//! A [`Record`] is the unit of persistence. Its `fields` map is open-schema:
//! keys are whatever the host form names its controls, and values are
//! restricted to the three shapes a form can produce (see [`FieldValue`]).
//!
//! # Wire format
//!
//! Records serialize to the same camelCase JSON object used by stored
//! snapshots and exported files:
//!
//! ```json
//! {
//!   "id": "RP-20240101-093015123-4821",
//!   "type": "repair",
//!   "label": "Console",
//!   "createdAt": "2024-01-01T09:30:15.123Z",
//!   "updatedAt": "2024-01-01T09:41:02.004Z",
//!   "date": "2024-01-01",
//!   "ticketId": "RP-20240101-093015123-4821",
//!   "fields": { "customer_name": "Ada", "warranty": true }
//! }
//! ```
//!
//! `ticketId` is the user-editable display id. It is never consulted when
//! deciding which stored record an import replaces; that is always `id`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Mapping from form field name to value. Absent keys mean "not set".
pub type FieldMap = BTreeMap<String, FieldValue>;

/// One field value: free text, a checkbox state, or a multi-select group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Text form of the value, `None` when falsy.
    ///
    /// Empty text, `false` and an empty list are falsy.
    #[must_use]
    pub fn as_display_text(&self) -> Option<String> {
        match self {
            Self::Text(s) if !s.is_empty() => Some(s.clone()),
            Self::Bool(true) => Some("true".to_string()),
            Self::List(items) if !items.is_empty() => Some(items.join(",")),
            _ => None,
        }
    }

    /// Whether a single checkbox bound to this value should be checked.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => !s.is_empty(),
            // Any list, even an empty one, checks a lone checkbox.
            Self::List(_) => true,
        }
    }

    /// Whether a grouped radio/checkbox option with `option` value is selected.
    #[must_use]
    pub fn selects(&self, option: &str) -> bool {
        match self {
            Self::List(items) => items.iter().any(|item| item == option),
            Self::Text(s) => s == option,
            Self::Bool(_) => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// A persisted ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable merge key; unique within a store and never reassigned.
    pub id: String,
    /// Category tag, e.g. `repair` or `buytrade`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display tag for the category pill.
    pub label: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    /// User-editable logical date.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// User-editable display id. Empty means "not assigned yet".
    #[serde(rename = "ticketId", default, skip_serializing_if = "String::is_empty")]
    pub secondary_id: String,
    #[serde(default)]
    pub fields: FieldMap,
}

impl Record {
    /// The id shown to the user: `secondary_id` when set, else `id`.
    #[must_use]
    pub fn display_id(&self) -> &str {
        if self.secondary_id.is_empty() {
            &self.id
        } else {
            &self.secondary_id
        }
    }

    /// Raise `updated_at` to `now`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(now);
    }
}

/// Format a timestamp the way stored tickets carry them (millisecond RFC 3339, `Z`).
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp leniently.
///
/// Accepts RFC 3339 (any offset, normalized to UTC) and bare `YYYY-MM-DD`,
/// which is read as midnight UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a logical date, accepting either `YYYY-MM-DD` or a full timestamp.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
}

/// Serde adapter pinning timestamps to millisecond RFC 3339 in UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}
