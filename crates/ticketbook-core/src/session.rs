//! Event entry points tying the store, the form and the list view together.
//!
//! Each `on_*` method is one complete reaction to one host event: it reads
//! the form, mutates the store (which persists), pushes state back to the
//! form where needed, and re-renders the list exactly once. The view only
//! receives derived rows, so rendering cannot reach back into the session.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{ParseError, ReferenceError, TransferError};
use crate::form::{FormBridge, FormSurface};
use crate::kv::KeyValueStore;
use crate::store::{MergeOutcome, RecordStore};
use crate::transfer::{Blob, ExportedFile, ImportBatch, export_one, import_many, import_results, read_blob};
use crate::view::{View, list_entries};

/// Result of one import selection.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Ids merged, in file order, with whether each was new.
    pub merged: Vec<(String, MergeOutcome)>,
    /// One entry per file that could not be read or parsed.
    pub failures: Vec<ParseError>,
    /// Whether the combined snapshot write after the batch succeeded.
    pub persisted: bool,
}

pub struct Session<K, F, V> {
    store: RecordStore<K>,
    bridge: FormBridge,
    form: F,
    view: V,
    name_field: String,
}

impl<K, F, V> std::fmt::Debug for Session<K, F, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("name_field", &self.name_field)
            .finish_non_exhaustive()
    }
}

impl<K: KeyValueStore, F: FormSurface, V: View> Session<K, F, V> {
    /// Load the persisted tickets and bind one to the form.
    ///
    /// An empty store gets a fresh ticket. Otherwise the last active ticket
    /// is restored when it still exists, else the first stored one.
    pub fn open(
        mut store: RecordStore<K>,
        bridge: FormBridge,
        form: F,
        view: V,
        name_field: impl Into<String>,
    ) -> Self {
        store.load();
        if store.is_empty() {
            store.create_new(true);
        } else {
            let target = store
                .remembered_active_id()
                .or_else(|| store.records().first().map(|r| r.id.clone()));
            if let Some(id) = target {
                let _ = store.select_active(&id);
            }
        }
        info!(count = store.len(), active = ?store.active_id(), "session opened");

        let mut session = Self {
            store,
            bridge,
            form,
            view,
            name_field: name_field.into(),
        };
        session.apply_active();
        session.render();
        session
    }

    #[must_use]
    pub const fn store(&self) -> &RecordStore<K> {
        &self.store
    }

    #[must_use]
    pub const fn form(&self) -> &F {
        &self.form
    }

    pub const fn form_mut(&mut self) -> &mut F {
        &mut self.form
    }

    #[must_use]
    pub const fn view(&self) -> &V {
        &self.view
    }

    /// Any form control changed: save the live state and re-render.
    pub fn on_field_change(&mut self) {
        self.save_live();
        self.render();
    }

    /// "New ticket": keep the current edits, then start a blank ticket.
    pub fn on_new(&mut self) {
        self.save_live();
        self.store.create_new(true);
        self.apply_active();
        self.render();
    }

    /// A list entry was clicked: keep the current edits, then switch.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] when `id` names no ticket; the current
    /// ticket stays active and its edits are still saved.
    pub fn on_select(&mut self, id: &str) -> Result<(), ReferenceError> {
        self.save_live();
        let selected = self.store.select_active(id).map(|_| ());
        if let Err(err) = &selected {
            debug!(code = %err.code(), "{err}");
        } else {
            self.apply_active();
        }
        self.render();
        selected
    }

    /// "Save": commit the form, assigning a display id if it is blank, and
    /// export the ticket as a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] if the ticket cannot be serialized. The
    /// save itself has already happened by then.
    pub fn on_save(&mut self) -> Result<ExportedFile, TransferError> {
        let category = self.store.settings().category.clone();
        let typed_id = self.bridge.read_secondary_id(&self.form);
        let record = self.store.save_from_form(
            self.bridge.read_form(&self.form),
            self.bridge.read_date(&self.form),
            &typed_id,
            true,
        );
        if record.secondary_id != typed_id {
            self.bridge.write_secondary_id(&mut self.form, &record.secondary_id);
        }
        let exported = export_one(record, &category, &self.name_field);
        self.render();

        let file = exported?;
        debug!(file = %file.file_name, "ticket exported");
        Ok(file)
    }

    /// Merge a selection of ticket files.
    ///
    /// Every blob is parsed independently; the good ones are merged, and the
    /// collection is persisted and rendered once for the whole batch.
    pub fn on_import(&mut self, blobs: impl IntoIterator<Item = Blob>) -> ImportReport {
        self.merge_batch(import_many(blobs))
    }

    /// Read `paths` and import them as one batch. Failures, unreadable files
    /// included, are reported in path order.
    pub fn on_import_paths(&mut self, paths: &[PathBuf]) -> ImportReport {
        self.merge_batch(import_results(paths.iter().map(|path| read_blob(path))))
    }

    fn merge_batch(&mut self, batch: ImportBatch) -> ImportReport {
        let mut report = ImportReport {
            failures: batch.failures,
            ..ImportReport::default()
        };

        for imported in batch.documents {
            let (record, outcome) = self.store.merge_external(imported.doc);
            debug!(source = %imported.source, id = %record.id, ?outcome, "imported ticket");
            report.merged.push((record.id.clone(), outcome));
        }

        report.persisted = self.store.persist().is_ok();

        let fallback = if self.store.active().is_none() {
            self.store.records().first().map(|r| r.id.clone())
        } else {
            None
        };
        if let Some(id) = fallback {
            let _ = self.store.select_active(&id);
        }
        // A replaced active ticket must show its imported content.
        self.apply_active();
        self.render();

        info!(
            merged = report.merged.len(),
            failed = report.failures.len(),
            persisted = report.persisted,
            "import finished"
        );
        report
    }

    fn save_live(&mut self) {
        self.store.save_from_form(
            self.bridge.read_form(&self.form),
            self.bridge.read_date(&self.form),
            &self.bridge.read_secondary_id(&self.form),
            false,
        );
    }

    fn apply_active(&mut self) {
        if let Some(record) = self.store.active() {
            self.bridge.apply_record(&mut self.form, record);
        }
    }

    fn render(&mut self) {
        let ordered = self.store.derive_display_order();
        let entries = list_entries(&ordered, self.store.active_id(), &self.name_field);
        self.view.render(&entries);
    }
}
