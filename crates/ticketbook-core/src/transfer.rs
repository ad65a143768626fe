//! Per-ticket JSON files: export one record, import many documents.
//!
//! Export names files `<category>-<name>.json`, where `<name>` is the first
//! non-empty of the record's name field, its display id, its id, or
//! `ticket`. In both parts every run of characters outside `[A-Za-z0-9_-]`
//! is replaced by a single `_`, so the name never leaves its directory.
//!
//! Import parses each blob on its own. A blob that is not UTF-8, not JSON,
//! or not a JSON object is reported and skipped; the others still load.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ParseError, TransferError};
use crate::record::Record;

/// Raw file contents with the name it was selected under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A document parsed from one blob.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedDocument {
    pub source: String,
    pub doc: Map<String, Value>,
}

/// Outcome of parsing one import selection.
#[derive(Debug, Default)]
pub struct ImportBatch {
    pub documents: Vec<ImportedDocument>,
    pub failures: Vec<ParseError>,
}

/// Read one file into a blob named after the file.
///
/// # Errors
///
/// Returns [`ParseError::Unreadable`] if the file cannot be read.
pub fn read_blob(path: &Path) -> Result<Blob, ParseError> {
    let bytes = fs::read(path).map_err(|error| ParseError::Unreadable {
        path: path.to_path_buf(),
        error,
    })?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(Blob::new(name, bytes))
}

/// Read `paths` into blobs. Unreadable files become failures instead of
/// aborting the batch.
#[must_use]
pub fn read_blobs(paths: &[PathBuf]) -> (Vec<Blob>, Vec<ParseError>) {
    let mut blobs = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        match read_blob(path) {
            Ok(blob) => blobs.push(blob),
            Err(err) => {
                warn!(code = %err.code(), "{err}");
                failures.push(err);
            }
        }
    }
    (blobs, failures)
}

/// Parse every blob independently.
pub fn import_many(blobs: impl IntoIterator<Item = Blob>) -> ImportBatch {
    import_results(blobs.into_iter().map(Ok))
}

/// Parse a mix of read blobs and read failures, keeping input order in
/// both `documents` and `failures`.
pub fn import_results(items: impl IntoIterator<Item = Result<Blob, ParseError>>) -> ImportBatch {
    let mut batch = ImportBatch::default();
    for item in items {
        match item.and_then(parse_blob) {
            Ok(doc) => batch.documents.push(doc),
            Err(err) => {
                warn!(code = %err.code(), "skipping ticket file: {err}");
                batch.failures.push(err);
            }
        }
    }
    batch
}

fn parse_blob(blob: Blob) -> Result<ImportedDocument, ParseError> {
    let Blob { name, bytes } = blob;
    let Ok(text) = String::from_utf8(bytes) else {
        return Err(ParseError::NotText { source_name: name });
    };
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(error) => {
            return Err(ParseError::InvalidJson {
                source_name: name,
                error,
            });
        }
    };
    match value {
        Value::Object(doc) => Ok(ImportedDocument { source: name, doc }),
        other => Err(ParseError::NotAnObject {
            source_name: name,
            found: json_kind(&other),
        }),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A serialized ticket ready to be saved as a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Serialize one record as pretty JSON and name its file.
///
/// # Errors
///
/// Returns [`TransferError::Serialize`] if the record cannot be serialized.
pub fn export_one(record: &Record, category: &str, name_field: &str) -> Result<ExportedFile, TransferError> {
    let bytes = serde_json::to_vec_pretty(record).map_err(|error| TransferError::Serialize {
        id: record.id.clone(),
        error,
    })?;
    Ok(ExportedFile {
        file_name: format!(
            "{}-{}.json",
            sanitize_file_stem(category),
            export_name(record, name_field)
        ),
        bytes,
    })
}

/// Write an exported file into `dir`, returning its path.
///
/// # Errors
///
/// Returns [`TransferError::Write`] if the directory or file cannot be written.
pub fn write_export(dir: &Path, file: &ExportedFile) -> Result<PathBuf, TransferError> {
    let path = dir.join(&file.file_name);
    fs::create_dir_all(dir)
        .and_then(|()| fs::write(&path, &file.bytes))
        .map_err(|error| TransferError::Write {
            path: path.clone(),
            error,
        })?;
    Ok(path)
}

fn export_name(record: &Record, name_field: &str) -> String {
    let base = record
        .fields
        .get(name_field)
        .and_then(crate::record::FieldValue::as_display_text)
        .or_else(|| (!record.secondary_id.is_empty()).then(|| record.secondary_id.clone()))
        .or_else(|| (!record.id.is_empty()).then(|| record.id.clone()))
        .unwrap_or_else(|| "ticket".to_string());
    sanitize_file_stem(&base)
}

/// Replace each run of characters outside `[A-Za-z0-9_-]` with one `_`.
#[must_use]
pub fn sanitize_file_stem(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_run = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldMap, FieldValue};
    use chrono::{TimeZone, Utc};

    fn record() -> Record {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Record {
            id: "RP-20240101-000000000-1234".into(),
            kind: "repair".into(),
            label: "Console".into(),
            created_at: ts,
            updated_at: ts,
            date: None,
            secondary_id: String::new(),
            fields: FieldMap::new(),
        }
    }

    #[test]
    fn sanitize_collapses_runs() {
        assert_eq!(sanitize_file_stem("Ada Lovelace"), "Ada_Lovelace");
        assert_eq!(sanitize_file_stem("a  / b"), "a_b");
        assert_eq!(sanitize_file_stem("José"), "Jos_");
        assert_eq!(sanitize_file_stem("ok_name-1"), "ok_name-1");
    }

    #[test]
    fn export_name_prefers_customer_name() {
        let mut r = record();
        r.secondary_id = "CUSTOM 7".into();
        r.fields.insert("customer_name".into(), "Ada L.".into());
        let file = export_one(&r, "repair", "customer_name").unwrap();
        assert_eq!(file.file_name, "repair-Ada_L_.json");
    }

    #[test]
    fn export_name_falls_back_to_display_id_then_id() {
        let mut r = record();
        r.fields.insert("customer_name".into(), "".into());
        r.secondary_id = "CUSTOM 7".into();
        assert_eq!(
            export_one(&r, "repair", "customer_name").unwrap().file_name,
            "repair-CUSTOM_7.json"
        );

        r.secondary_id.clear();
        assert_eq!(
            export_one(&r, "repair", "customer_name").unwrap().file_name,
            "repair-RP-20240101-000000000-1234.json"
        );
    }

    #[test]
    fn export_category_cannot_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let file = export_one(&record(), "../x", "customer_name").unwrap();
        assert_eq!(file.file_name, "_x-RP-20240101-000000000-1234.json");

        let path = write_export(&out, &file).unwrap();
        assert_eq!(path.parent(), Some(out.as_path()));
    }

    #[test]
    fn import_results_keeps_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.json");
        let batch = import_results(vec![
            Ok(Blob::new("bad.json", "{")),
            Ok(Blob::new("good.json", "{}")),
            read_blob(&missing),
        ]);
        assert_eq!(batch.documents.len(), 1);
        assert!(matches!(batch.failures[0], ParseError::InvalidJson { .. }));
        assert!(matches!(batch.failures[1], ParseError::Unreadable { .. }));
    }

    #[test]
    fn export_is_pretty_json_of_the_record() {
        let mut r = record();
        r.fields.insert("paid".into(), FieldValue::Bool(true));
        let file = export_one(&r, "repair", "customer_name").unwrap();
        let text = String::from_utf8(file.bytes).unwrap();
        assert!(text.contains("\n  \"id\""), "pretty printed: {text}");
        let back: Record = serde_json::from_str(&text).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn import_skips_bad_blobs_only() {
        let batch = import_many(vec![
            Blob::new("1.json", r#"{"id":"a","fields":{}}"#),
            Blob::new("2.json", "{broken"),
            Blob::new("3.json", r#"{"id":"c"}"#),
            Blob::new("4.json", "[1,2]"),
            Blob::new("5.json", vec![0xff, 0xfe]),
        ]);
        let sources: Vec<&str> = batch.documents.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, ["1.json", "3.json"]);
        assert_eq!(batch.failures.len(), 3);
        assert!(matches!(batch.failures[0], ParseError::InvalidJson { ref source_name, .. } if source_name == "2.json"));
        assert!(matches!(batch.failures[1], ParseError::NotAnObject { found: "array", .. }));
        assert!(matches!(batch.failures[2], ParseError::NotText { .. }));
    }

    #[test]
    fn read_blobs_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.json");
        fs::write(&present, "{}").unwrap();
        let missing = dir.path().join("missing.json");

        let (blobs, failures) = read_blobs(&[present, missing]);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].name, "a.json");
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], ParseError::Unreadable { .. }));
    }

    #[test]
    fn write_export_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = export_one(&record(), "repair", "customer_name").unwrap();
        let path = write_export(&dir.path().join("out"), &file).unwrap();
        assert_eq!(fs::read(path).unwrap(), file.bytes);
    }
}
