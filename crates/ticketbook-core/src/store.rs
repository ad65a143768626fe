//! The in-memory record collection and every mutation of it.
//!
//! [`RecordStore`] is the single writer of the collection. It owns:
//!
//! - the records, in insertion order (display order is derived on demand by
//!   [`RecordStore::derive_display_order`] and never stored),
//! - an id → position index for O(1) lookups,
//! - the active record id,
//! - the [`PersistenceAdapter`] that snapshots the collection.
//!
//! # Invariants
//!
//! - No two records share an `id`. New ids are regenerated on collision and
//!   merges replace in place.
//! - `updated_at` never decreases for a record saved through the store.
//! - Persistence failures never roll back in-memory state; the last failure
//!   is kept in [`RecordStore::last_persist_error`] until a persist succeeds.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{ErrorCode, PersistenceError, ReferenceError};
use crate::id::IdGenerator;
use crate::kv::KeyValueStore;
use crate::normalize::{NormalizeDefaults, normalize_document};
use crate::persist::PersistenceAdapter;
use crate::record::{FieldMap, Record};

/// Category and label stamped on records this store creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub category: String,
    pub label: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            category: "repair".to_string(),
            label: "Console".to_string(),
        }
    }
}

/// Whether a merge inserted a new record or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
}

pub struct RecordStore<K> {
    records: Vec<Record>,
    index: HashMap<String, usize>,
    active_id: Option<String>,
    settings: StoreSettings,
    ids: IdGenerator,
    clock: Box<dyn Clock>,
    persistence: PersistenceAdapter<K>,
    last_persist_error: Option<PersistenceError>,
}

impl<K> std::fmt::Debug for RecordStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("records", &self.records.len())
            .field("active_id", &self.active_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<K: KeyValueStore> RecordStore<K> {
    /// Empty store on the system clock. Call [`Self::load`] to read the
    /// persisted snapshot.
    pub fn new(persistence: PersistenceAdapter<K>, settings: StoreSettings) -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            active_id: None,
            settings,
            ids: IdGenerator::new(),
            clock: Box::new(SystemClock),
            persistence,
            last_persist_error: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.index.get(id).map(|&idx| &self.records[idx])
    }

    #[must_use]
    pub const fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    #[must_use]
    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// The active record, or `None` when nothing is active or the active id
    /// no longer names a record.
    #[must_use]
    pub fn active(&self) -> Option<&Record> {
        self.active_index().map(|idx| &self.records[idx])
    }

    fn active_index(&self) -> Option<usize> {
        let id = self.active_id.as_deref()?;
        let idx = self.index.get(id).copied();
        if idx.is_none() {
            debug!(id, "active id does not name a record");
        }
        idx
    }

    /// Records sorted by `updated_at`, newest first. Ties keep insertion order.
    #[must_use]
    pub fn derive_display_order(&self) -> Vec<&Record> {
        let mut ordered: Vec<&Record> = self.records.iter().collect();
        ordered.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        ordered
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append a fresh record with empty fields, persist, and optionally make
    /// it active.
    pub fn create_new(&mut self, make_active: bool) -> &Record {
        let idx = self.insert_new(make_active);
        &self.records[idx]
    }

    fn insert_new(&mut self, make_active: bool) -> usize {
        let now = self.clock.now();
        let id = self.unused_id(now);
        let record = Record {
            id: id.clone(),
            kind: self.settings.category.clone(),
            label: self.settings.label.clone(),
            created_at: now,
            updated_at: now,
            date: Some(now.date_naive()),
            secondary_id: String::new(),
            fields: FieldMap::new(),
        };

        let idx = self.records.len();
        self.index.insert(id.clone(), idx);
        self.records.push(record);
        debug!(id = %id, "ticket created");

        self.persist_logged();
        if make_active {
            self.set_active(id);
        }
        idx
    }

    fn unused_id(&mut self, now: DateTime<Utc>) -> String {
        let mut at = now;
        loop {
            let id = self.ids.generate(at, &self.settings.category);
            if !self.index.contains_key(&id) {
                return id;
            }
            warn!(id = %id, "generated id collides, regenerating");
            at += Duration::milliseconds(1);
        }
    }

    /// Write the form's state into the active record, creating one first if
    /// nothing is active.
    ///
    /// `snapshot` replaces `fields` wholesale. `secondary_id` is the value of
    /// the form's display-id control; when it is empty and
    /// `assign_secondary_id_if_empty` is set, the record's `id` is used
    /// instead.
    pub fn save_from_form(
        &mut self,
        snapshot: FieldMap,
        date: Option<NaiveDate>,
        secondary_id: &str,
        assign_secondary_id_if_empty: bool,
    ) -> &Record {
        let idx = match self.active_index() {
            Some(idx) => idx,
            None => self.insert_new(true),
        };
        let now = self.clock.now();

        let record = &mut self.records[idx];
        record.fields = snapshot;
        record.date = date;
        record.secondary_id = if secondary_id.is_empty() && assign_secondary_id_if_empty {
            record.id.clone()
        } else {
            secondary_id.to_string()
        };
        record.touch(now);
        debug!(id = %record.id, fields = record.fields.len(), "ticket saved from form");

        self.persist_logged();
        &self.records[idx]
    }

    /// Make `id` the active record and remember it across sessions.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::MissingRecord`] and changes nothing when
    /// `id` names no record.
    pub fn select_active(&mut self, id: &str) -> Result<&Record, ReferenceError> {
        let Some(&idx) = self.index.get(id) else {
            return Err(ReferenceError::MissingRecord { id: id.to_string() });
        };
        self.set_active(id.to_string());
        Ok(&self.records[idx])
    }

    fn set_active(&mut self, id: String) {
        if let Err(err) = self.persistence.save_last_active_id(&id) {
            error!(id = %id, code = %err.code(), "failed to persist last active id: {err}");
            self.last_persist_error = Some(err);
        }
        self.active_id = Some(id);
    }

    /// Normalize an external document and upsert it by `id`.
    ///
    /// An existing record with the same `id` is replaced whole; otherwise the
    /// record is appended. Does not persist: callers merging a batch persist
    /// once at the end with [`Self::persist`].
    pub fn merge_external(&mut self, doc: Map<String, Value>) -> (&Record, MergeOutcome) {
        let now = self.clock.now();
        let settings = self.settings.clone();
        let defaults = NormalizeDefaults {
            category: &settings.category,
            label: &settings.label,
            now,
        };
        // Generated ids go through the index so only a document's own `id`
        // can replace a stored record.
        let record = normalize_document(doc, defaults, || self.unused_id(now));

        let (idx, outcome) = if let Some(&idx) = self.index.get(&record.id) {
            self.records[idx] = record;
            (idx, MergeOutcome::Replaced)
        } else {
            let idx = self.records.len();
            self.index.insert(record.id.clone(), idx);
            self.records.push(record);
            (idx, MergeOutcome::Inserted)
        };
        debug!(id = %self.records[idx].id, ?outcome, "ticket merged");
        (&self.records[idx], outcome)
    }

    /// Replace the whole collection with the persisted snapshot.
    ///
    /// The active id is kept only if it still names a record.
    pub fn load(&mut self) {
        self.records = self.persistence.load_snapshot();
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.id.clone(), idx))
            .collect();
        if self.active_index().is_none() {
            self.active_id = None;
        }
        debug!(count = self.records.len(), "tickets loaded");
    }

    /// The persisted last-active id, if it still names a record.
    #[must_use]
    pub fn remembered_active_id(&self) -> Option<String> {
        self.persistence
            .load_last_active_id()
            .filter(|id| self.index.contains_key(id))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Snapshot the collection.
    ///
    /// # Errors
    ///
    /// Returns the failure's code. In-memory state is unaffected and the
    /// full error is kept in [`Self::last_persist_error`].
    pub fn persist(&mut self) -> Result<(), ErrorCode> {
        match self.persistence.save_snapshot(&self.records) {
            Ok(()) => {
                self.last_persist_error = None;
                Ok(())
            }
            Err(err) => {
                let code = err.code();
                error!(code = %code, "failed to persist tickets: {err}");
                self.last_persist_error = Some(err);
                Err(code)
            }
        }
    }

    fn persist_logged(&mut self) {
        let _ = self.persist();
    }

    #[must_use]
    pub const fn last_persist_error(&self) -> Option<&PersistenceError> {
        self.last_persist_error.as_ref()
    }

    #[must_use]
    pub const fn persistence(&self) -> &PersistenceAdapter<K> {
        &self.persistence
    }

    pub const fn persistence_mut(&mut self) -> &mut PersistenceAdapter<K> {
        &mut self.persistence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::kv::MemoryKv;
    use crate::record::FieldValue;
    use chrono::TimeZone;
    use serde_json::json;
    use std::rc::Rc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn store_with(kv: MemoryKv) -> (RecordStore<MemoryKv>, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::new(start()));
        let store = RecordStore::new(
            PersistenceAdapter::new(kv, "records", "repair"),
            StoreSettings::default(),
        )
        .with_clock(Rc::clone(&clock))
        .with_id_generator(IdGenerator::seeded(11));
        (store, clock)
    }

    fn store() -> (RecordStore<MemoryKv>, Rc<ManualClock>) {
        store_with(MemoryKv::new())
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), FieldValue::from(*v)))
            .collect()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn create_new_on_empty_store() {
        let (mut store, _) = store();
        let id = store.create_new(true).id.clone();

        assert_eq!(store.len(), 1);
        let active = store.active().unwrap();
        assert_eq!(active.id, id);
        assert!(active.fields.is_empty());
        assert_eq!(active.created_at, start());
        assert_eq!(active.updated_at, start());
        assert_eq!(active.date, Some(start().date_naive()));
        assert_eq!(active.kind, "repair");
        assert_eq!(active.label, "Console");
    }

    #[test]
    fn create_new_persists_snapshot() {
        let (mut store, _) = store();
        store.create_new(false);
        assert_eq!(store.persistence().load_snapshot().len(), 1);
        assert!(store.active().is_none());
    }

    #[test]
    fn ids_stay_unique_within_one_millisecond() {
        let (mut store, _) = store();
        for _ in 0..500 {
            store.create_new(false);
        }
        let unique: std::collections::HashSet<_> = store.records().iter().map(|r| &r.id).collect();
        assert_eq!(unique.len(), 500);
    }

    #[test]
    fn save_without_active_creates_one() {
        let (mut store, _) = store();
        let saved = store
            .save_from_form(fields(&[("customer_name", "Ada")]), None, "", false)
            .clone();
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_id(), Some(saved.id.as_str()));
        assert_eq!(saved.fields["customer_name"], FieldValue::from("Ada"));
    }

    #[test]
    fn save_replaces_fields_wholesale() {
        let (mut store, _) = store();
        store.create_new(true);
        store.save_from_form(fields(&[("a", "1"), ("b", "2")]), None, "", false);
        store.save_from_form(fields(&[("c", "3")]), None, "", false);

        assert_eq!(store.active().unwrap().fields, fields(&[("c", "3")]));
    }

    #[test]
    fn secondary_id_assignment() {
        let (mut store, _) = store();
        let id = store.create_new(true).id.clone();

        store.save_from_form(FieldMap::new(), None, "", false);
        assert_eq!(store.active().unwrap().secondary_id, "");

        store.save_from_form(FieldMap::new(), None, "", true);
        assert_eq!(store.active().unwrap().secondary_id, id);

        store.save_from_form(FieldMap::new(), None, "MINE-1", true);
        assert_eq!(store.active().unwrap().secondary_id, "MINE-1");
    }

    #[test]
    fn save_refreshes_updated_at_monotonically() {
        let (mut store, clock) = store();
        store.create_new(true);

        clock.advance(Duration::seconds(30));
        let first = store.save_from_form(FieldMap::new(), None, "", false).updated_at;
        assert_eq!(first, start() + Duration::seconds(30));

        clock.set(start());
        let second = store.save_from_form(FieldMap::new(), None, "", false).updated_at;
        assert_eq!(second, first, "clock moved back, updated_at must not");
    }

    #[test]
    fn select_unknown_is_noop() {
        let (mut store, _) = store();
        let id = store.create_new(true).id.clone();
        let err = store.select_active("nope").unwrap_err();
        assert_eq!(err, ReferenceError::MissingRecord { id: "nope".into() });
        assert_eq!(store.active_id(), Some(id.as_str()));
    }

    #[test]
    fn select_remembers_last_active() {
        let (mut store, _) = store();
        let a = store.create_new(true).id.clone();
        let b = store.create_new(false).id.clone();

        store.select_active(&b).unwrap();
        assert_eq!(store.remembered_active_id().as_deref(), Some(b.as_str()));
        store.select_active(&a).unwrap();
        assert_eq!(store.remembered_active_id().as_deref(), Some(a.as_str()));
    }

    #[test]
    fn merge_replaces_same_id() {
        let (mut store, _) = store();
        let id = store.create_new(true).id.clone();
        store.save_from_form(fields(&[("customer_name", "Old"), ("extra", "x")]), None, "", false);

        let doc = json!({
            "id": id,
            "type": "repair",
            "label": "Console",
            "createdAt": "2023-01-01T00:00:00.000Z",
            "updatedAt": "2023-01-02T00:00:00.000Z",
            "fields": {"customer_name": "New"}
        });
        let (merged, outcome) = store.merge_external(object(doc));
        assert_eq!(outcome, MergeOutcome::Replaced);
        let merged = merged.clone();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id), Some(&merged));
        assert_eq!(merged.fields, fields(&[("customer_name", "New")]));
    }

    #[test]
    fn merge_appends_new_id() {
        let (mut store, _) = store();
        store.create_new(true);
        let (_, outcome) = store.merge_external(object(json!({"id": "X-1", "fields": {}})));
        assert_eq!(outcome, MergeOutcome::Inserted);
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[1].id, "X-1");
    }

    #[test]
    fn merge_ignores_secondary_id_for_matching() {
        let (mut store, _) = store();
        let id = store.create_new(true).id.clone();
        store.save_from_form(FieldMap::new(), None, "SHARED", false);

        let doc = json!({"id": "OTHER", "ticketId": "SHARED", "fields": {}});
        let (_, outcome) = store.merge_external(object(doc));
        assert_eq!(outcome, MergeOutcome::Inserted);
        assert!(store.get(&id).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn merging_id_less_documents_never_replaces() {
        let (mut store, _) = store_with(MemoryKv::new());
        store = store.with_id_generator(IdGenerator::seeded(42));
        let first = store.create_new(true).id.clone();

        for i in 0..300 {
            let doc = json!({ "customer_name": format!("legacy-{i}") });
            let (record, outcome) = store.merge_external(object(doc));
            assert_eq!(outcome, MergeOutcome::Inserted, "document {i} got {}", record.id);
        }

        assert_eq!(store.len(), 301);
        assert!(store.get(&first).is_some_and(|r| r.fields.is_empty()));
        let names = store
            .records()
            .iter()
            .filter_map(|r| r.fields.get("customer_name"))
            .count();
        assert_eq!(names, 300);
    }

    #[test]
    fn display_order_newest_first() {
        let (mut store, _) = store();
        store.merge_external(object(json!({"id": "old", "updatedAt": "2024-01-01", "fields": {}})));
        store.merge_external(object(json!({"id": "new", "updatedAt": "2024-01-02", "fields": {}})));

        let order: Vec<&str> = store.derive_display_order().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, ["new", "old"]);
        assert_eq!(store.records()[0].id, "old", "stored order untouched");
    }

    #[test]
    fn display_order_ties_keep_insertion_order() {
        let (mut store, _) = store();
        for id in ["a", "b", "c"] {
            store.merge_external(object(json!({"id": id, "updatedAt": "2024-01-01", "fields": {}})));
        }
        let order: Vec<&str> = store.derive_display_order().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn persist_failure_keeps_memory_state() {
        let (mut store, _) = store_with(MemoryKv::with_quota(1_000));
        store.create_new(true);
        assert!(store.last_persist_error().is_none());

        let big = "x".repeat(2_000);
        store.save_from_form(fields(&[("notes", big.as_str())]), None, "", false);

        assert!(store.last_persist_error().is_some());
        assert_eq!(store.active().unwrap().fields["notes"], FieldValue::Text(big));
        assert!(store.persistence().load_snapshot()[0].fields.is_empty());
        assert_eq!(store.persist(), Err(ErrorCode::QuotaExceeded));

        store.save_from_form(FieldMap::new(), None, "", false);
        assert!(store.last_persist_error().is_none(), "successful persist clears the error");
    }

    #[test]
    fn load_replaces_collection_and_drops_stale_active() {
        let (mut store, _) = store();
        store.create_new(true);
        store.create_new(false);

        store.persistence_mut().save_snapshot(&[]).unwrap();
        store.load();
        assert!(store.is_empty());
        assert!(store.active().is_none());
        assert!(store.active_id().is_none());
    }
}
