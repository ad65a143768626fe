//! Sidebar list derivation and the render seam.

use crate::record::Record;

/// Longest display id shown in a list entry, in characters.
pub const SHORT_ID_LEN: usize = 18;

/// Title shown for tickets without a name.
pub const UNNAMED_TITLE: &str = "No Name";

/// One row of the ticket list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub id: String,
    pub title: String,
    /// Logical date, or the creation day when none is set.
    pub date: String,
    pub short_id: String,
    pub pill: String,
    pub active: bool,
}

impl ListEntry {
    #[must_use]
    pub fn from_record(record: &Record, name_field: &str, active: bool) -> Self {
        let title = record
            .fields
            .get(name_field)
            .and_then(crate::record::FieldValue::as_display_text)
            .unwrap_or_else(|| UNNAMED_TITLE.to_string());
        let date = record
            .date
            .unwrap_or_else(|| record.created_at.date_naive())
            .to_string();
        Self {
            id: record.id.clone(),
            title,
            date,
            short_id: record.display_id().chars().take(SHORT_ID_LEN).collect(),
            pill: record.label.clone(),
            active,
        }
    }
}

/// Build list rows for `ordered` records, flagging `active_id`.
#[must_use]
pub fn list_entries(ordered: &[&Record], active_id: Option<&str>, name_field: &str) -> Vec<ListEntry> {
    ordered
        .iter()
        .map(|record| ListEntry::from_record(record, name_field, Some(record.id.as_str()) == active_id))
        .collect()
}

/// Host hook that redraws the ticket list.
pub trait View {
    fn render(&mut self, entries: &[ListEntry]);
}

/// A view that keeps every render, for headless hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    pub renders: Vec<Vec<ListEntry>>,
}

impl RecordingView {
    #[must_use]
    pub fn last(&self) -> Option<&[ListEntry]> {
        self.renders.last().map(Vec::as_slice)
    }
}

impl View for RecordingView {
    fn render(&mut self, entries: &[ListEntry]) {
        self.renders.push(entries.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldMap, FieldValue};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn record(id: &str) -> Record {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 22, 0, 0).unwrap();
        Record {
            id: id.into(),
            kind: "buytrade".into(),
            label: "Trade".into(),
            created_at: ts,
            updated_at: ts,
            date: None,
            secondary_id: String::new(),
            fields: FieldMap::new(),
        }
    }

    #[test]
    fn unnamed_ticket_entry() {
        let entry = ListEntry::from_record(&record("BT-20240309-220000000-1111"), "customer_name", false);
        assert_eq!(entry.title, "No Name");
        assert_eq!(entry.date, "2024-03-09");
        assert_eq!(entry.short_id, "BT-20240309-220000");
        assert_eq!(entry.pill, "Trade");
        assert!(!entry.active);
    }

    #[test]
    fn named_ticket_with_date_and_display_id() {
        let mut r = record("BT-1");
        r.fields.insert("customer_name".into(), FieldValue::from("Ada"));
        r.date = NaiveDate::from_ymd_opt(2024, 1, 5);
        r.secondary_id = "SHOP-42".into();

        let entry = ListEntry::from_record(&r, "customer_name", true);
        assert_eq!(entry.title, "Ada");
        assert_eq!(entry.date, "2024-01-05");
        assert_eq!(entry.short_id, "SHOP-42");
        assert!(entry.active);
    }

    #[test]
    fn entries_flag_only_the_active_record() {
        let a = record("a");
        let b = record("b");
        let entries = list_entries(&[&b, &a], Some("a"), "customer_name");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "b");
        assert!(!entries[0].active);
        assert!(entries[1].active);
    }
}
