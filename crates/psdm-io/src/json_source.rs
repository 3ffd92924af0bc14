//! Directory of JSON documents, one array of objects per entity kind.
//!
//! Scalars are kept as their textual form, `null` becomes an empty value and
//! nested objects or arrays (GeoJSON) are re-serialized into a JSON string.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use psdm_core::{EntityKind, RawRecord, RawRecordSource, SourceError};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::naming::file_name;

/// Reads `<dir>/<kind file>.json`.
#[derive(Debug, Clone)]
pub struct JsonRecordSource {
    dir: PathBuf,
}

impl JsonRecordSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.dir.join(file_name(kind, "json"))
    }
}

fn raw_value(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text,
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
    }
}

fn to_record(kind: EntityKind, document: Map<String, Value>) -> RawRecord {
    RawRecord::new(
        kind,
        document
            .into_iter()
            .map(|(field, value)| (field, raw_value(value))),
    )
}

impl RawRecordSource for JsonRecordSource {
    fn fetch(&self, kind: EntityKind) -> Result<Vec<RawRecord>, SourceError> {
        let path = self.path_for(kind);
        if !path.exists() {
            warn!(%kind, path = %path.display(), "no input file, kind is empty");
            return Ok(Vec::new());
        }

        let file = File::open(&path).map_err(|source| SourceError::Io { kind, source })?;
        let documents: Vec<Map<String, Value>> = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| SourceError::Malformed {
                kind,
                message: format!("{}: {err}", path.display()),
            })?;
        debug!(%kind, path = %path.display(), documents = documents.len(), "read json");
        Ok(documents
            .into_iter()
            .map(|document| to_record(kind, document))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_values_are_stringified() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("node_graphic_input.json"),
            r#"[{"uuid":"g1","graphicLayer":"main","path":null,"node":"n1",
                "point":{"type":"Point","coordinates":[1.0,2.0]},"scale":2,"visible":true}]"#,
        )
        .unwrap();
        let records = JsonRecordSource::new(dir.path())
            .fetch(EntityKind::NodeGraphic)
            .unwrap();
        let record = &records[0];
        assert_eq!(record.get("graphic_layer"), Some("main"));
        assert_eq!(record.get("path"), Some(""));
        assert_eq!(record.get("scale"), Some("2"));
        assert_eq!(record.get("visible"), Some("true"));
        let point: Value = serde_json::from_str(record.get("point").unwrap()).unwrap();
        assert_eq!(point["type"], "Point");
    }

    #[test]
    fn test_non_array_document_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("node_input.json"), r#"{"uuid":"x"}"#).unwrap();
        assert!(matches!(
            JsonRecordSource::new(dir.path()).fetch(EntityKind::Node),
            Err(SourceError::Malformed { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonRecordSource::new(dir.path())
            .fetch(EntityKind::Switch)
            .unwrap()
            .is_empty());
    }
}
