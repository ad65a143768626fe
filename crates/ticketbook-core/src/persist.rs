//! Snapshot persistence on top of a [`KeyValueStore`].
//!
//! Two keys are used per category:
//!
//! - `<namespace>_<category>_v1` holds the whole collection as one JSON array.
//! - `<namespace>_<category>_v1_lastActive` holds the last active id as plain text.
//!
//! Loading never fails: a missing, unparsable or non-array snapshot loads as
//! an empty collection, and array elements that do not decode as records are
//! skipped.

use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::error::{ErrorCode, PersistenceError};
use crate::kv::KeyValueStore;
use crate::record::Record;

/// Suffix appended to the snapshot key for the last-active id.
pub const LAST_ACTIVE_SUFFIX: &str = "_lastActive";

/// Snapshot key for a namespace and category.
#[must_use]
pub fn snapshot_key(namespace: &str, category: &str) -> String {
    format!("{namespace}_{category}_v1")
}

/// Saves and loads record snapshots and the last active id.
#[derive(Debug, Clone)]
pub struct PersistenceAdapter<K> {
    kv: K,
    key: String,
    last_active_key: String,
}

impl<K: KeyValueStore> PersistenceAdapter<K> {
    pub fn new(kv: K, namespace: &str, category: &str) -> Self {
        let key = snapshot_key(namespace, category);
        let last_active_key = format!("{key}{LAST_ACTIVE_SUFFIX}");
        Self {
            kv,
            key,
            last_active_key,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn last_active_key(&self) -> &str {
        &self.last_active_key
    }

    #[must_use]
    pub const fn kv(&self) -> &K {
        &self.kv
    }

    pub const fn kv_mut(&mut self) -> &mut K {
        &mut self.kv
    }

    /// Write the full collection under the snapshot key.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying write fails. The
    /// previously stored snapshot is left as it was.
    pub fn save_snapshot(&mut self, records: &[Record]) -> Result<(), PersistenceError> {
        let data = serde_json::to_string(records)?;
        self.kv.set(&self.key, &data)?;
        debug!(key = %self.key, count = records.len(), bytes = data.len(), "snapshot saved");
        Ok(())
    }

    /// Read the stored collection.
    ///
    /// Duplicate ids collapse to their last occurrence, keeping the position
    /// of the first.
    #[must_use]
    pub fn load_snapshot(&self) -> Vec<Record> {
        let raw = match self.kv.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                error!(key = %self.key, code = %err.code(), "failed to read snapshot: {err}");
                return Vec::new();
            }
        };

        let parsed: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                error!(
                    key = %self.key,
                    code = %ErrorCode::SnapshotCorrupt,
                    "failed to parse snapshot: {err}"
                );
                return Vec::new();
            }
        };

        let serde_json::Value::Array(items) = parsed else {
            error!(
                key = %self.key,
                code = %ErrorCode::SnapshotCorrupt,
                "snapshot is not a JSON array"
            );
            return Vec::new();
        };

        let mut records: Vec<Record> = Vec::with_capacity(items.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (idx, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<Record>(item) {
                Ok(record) => {
                    if let Some(&pos) = positions.get(&record.id) {
                        warn!(id = %record.id, "duplicate id in snapshot, keeping last");
                        records[pos] = record;
                    } else {
                        positions.insert(record.id.clone(), records.len());
                        records.push(record);
                    }
                }
                Err(err) => {
                    warn!(
                        key = %self.key,
                        index = idx,
                        code = %ErrorCode::SnapshotCorrupt,
                        "skipping undecodable snapshot entry: {err}"
                    );
                }
            }
        }
        records
    }

    /// Remember which record was active.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    pub fn save_last_active_id(&mut self, id: &str) -> Result<(), PersistenceError> {
        self.kv.set(&self.last_active_key, id)
    }

    /// The remembered active id, if any. Read failures yield `None`.
    #[must_use]
    pub fn load_last_active_id(&self) -> Option<String> {
        match self.kv.get(&self.last_active_key) {
            Ok(Some(id)) if !id.is_empty() => Some(id),
            Ok(_) => None,
            Err(err) => {
                error!(key = %self.last_active_key, "failed to read last active id: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::record::{FieldMap, FieldValue};
    use chrono::{TimeZone, Utc};

    fn record(id: &str, name: &str) -> Record {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut fields = FieldMap::new();
        fields.insert("customer_name".into(), name.into());
        Record {
            id: id.into(),
            kind: "repair".into(),
            label: "Console".into(),
            created_at: ts,
            updated_at: ts,
            date: None,
            secondary_id: String::new(),
            fields,
        }
    }

    fn adapter() -> PersistenceAdapter<MemoryKv> {
        PersistenceAdapter::new(MemoryKv::new(), "records", "repair")
    }

    #[test]
    fn keys_are_namespaced_by_category() {
        let a = adapter();
        assert_eq!(a.key(), "records_repair_v1");
        assert_eq!(a.last_active_key(), "records_repair_v1_lastActive");
    }

    #[test]
    fn snapshot_round_trip() {
        let mut a = adapter();
        let records = vec![record("a", "Ada"), record("b", "Bob")];
        a.save_snapshot(&records).unwrap();
        assert_eq!(a.load_snapshot(), records);
    }

    #[test]
    fn missing_snapshot_loads_empty() {
        assert!(adapter().load_snapshot().is_empty());
    }

    #[test]
    fn unparsable_snapshot_loads_empty() {
        let mut a = adapter();
        a.kv_mut().set("records_repair_v1", "[{not json").unwrap();
        assert!(a.load_snapshot().is_empty());
    }

    #[test]
    fn non_array_snapshot_loads_empty() {
        let mut a = adapter();
        a.kv_mut().set("records_repair_v1", r#"{"id":"a"}"#).unwrap();
        assert!(a.load_snapshot().is_empty());
    }

    #[test]
    fn bad_entries_are_skipped() {
        let mut a = adapter();
        let good = serde_json::to_value(record("a", "Ada")).unwrap();
        let raw = serde_json::json!([good, 42, {"id": "no-timestamps"}]).to_string();
        a.kv_mut().set("records_repair_v1", &raw).unwrap();

        let loaded = a.load_snapshot();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "a");
    }

    #[test]
    fn duplicate_ids_collapse_to_last() {
        let mut a = adapter();
        let raw = serde_json::to_string(&[record("a", "first"), record("b", "Bob"), record("a", "second")])
            .unwrap();
        a.kv_mut().set("records_repair_v1", &raw).unwrap();

        let loaded = a.load_snapshot();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "a");
        assert_eq!(loaded[0].fields["customer_name"], FieldValue::from("second"));
        assert_eq!(loaded[1].id, "b");
    }

    #[test]
    fn last_active_round_trip() {
        let mut a = adapter();
        assert_eq!(a.load_last_active_id(), None);
        a.save_last_active_id("RP-1").unwrap();
        assert_eq!(a.load_last_active_id().as_deref(), Some("RP-1"));
    }

    #[test]
    fn failed_save_keeps_previous_snapshot() {
        let mut a = PersistenceAdapter::new(MemoryKv::with_quota(400), "records", "repair");
        a.save_snapshot(&[record("a", "Ada")]).unwrap();

        let big = record("b", &"x".repeat(1_000));
        let err = a.save_snapshot(&[record("a", "Ada"), big]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::QuotaExceeded);
        assert_eq!(a.load_snapshot().len(), 1);
    }
}
