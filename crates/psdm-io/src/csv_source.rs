//! Directory of CSV files, one per entity kind.

use std::path::{Path, PathBuf};

use psdm_core::{EntityKind, RawRecord, RawRecordSource, SourceError};
use tracing::{debug, warn};

use crate::naming::file_name;

/// Reads `<dir>/<kind file>.csv`; the header row names the fields.
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    dir: PathBuf,
    delimiter: u8,
}

impl CsvRecordSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `kind`.
    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.dir.join(file_name(kind, "csv"))
    }
}

fn csv_error(kind: EntityKind, path: &Path, err: csv::Error) -> SourceError {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(source) = err.into_kind() {
            return SourceError::Io { kind, source };
        }
        return SourceError::Malformed {
            kind,
            message: format!("{}: unreadable", path.display()),
        };
    }
    SourceError::Malformed {
        kind,
        message: format!("{}: {err}", path.display()),
    }
}

impl RawRecordSource for CsvRecordSource {
    fn fetch(&self, kind: EntityKind) -> Result<Vec<RawRecord>, SourceError> {
        let path = self.path_for(kind);
        if !path.exists() {
            warn!(%kind, path = %path.display(), "no input file, kind is empty");
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|err| csv_error(kind, &path, err))?;
        let headers = reader
            .headers()
            .map_err(|err| csv_error(kind, &path, err))?
            .clone();

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|err| csv_error(kind, &path, err))?;
            records.push(RawRecord::new(kind, headers.iter().zip(row.iter())));
        }
        debug!(%kind, path = %path.display(), rows = records.len(), "read csv");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_rows_become_records() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("switch_input.csv"),
            "uuid,id,node_a,node_b,closed\n\
             5dc88077-aeb6-4711-9142-db57287640b1, s1 ,a,b,false\n",
        )
        .unwrap();
        let source = CsvRecordSource::new(dir.path());
        let records = source.fetch(EntityKind::Switch).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), EntityKind::Switch);
        assert_eq!(records[0].get("id"), Some("s1"));
        assert_eq!(records[0].get("nodeA"), Some("a"));
    }

    #[test]
    fn test_custom_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("node_input.csv"), "uuid;id\nx;n1\n").unwrap();
        let source = CsvRecordSource::new(dir.path()).with_delimiter(b';');
        let records = source.fetch(EntityKind::Node).unwrap();
        assert_eq!(records[0].get("id"), Some("n1"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvRecordSource::new(dir.path());
        assert!(source.fetch(EntityKind::Line).unwrap().is_empty());
    }

    #[test]
    fn test_ragged_rows_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("line_input.csv"), "uuid,id\na,b,c\n").unwrap();
        let source = CsvRecordSource::new(dir.path());
        assert!(matches!(
            source.fetch(EntityKind::Line),
            Err(SourceError::Malformed { kind: EntityKind::Line, .. })
        ));
    }
}
