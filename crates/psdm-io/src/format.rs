//! Input format detection and a unified way to open a source directory.

use std::path::Path;

use anyhow::{bail, Context, Result};
use psdm_core::{EntityKind, RawRecordSource};

use crate::csv_source::CsvRecordSource;
use crate::naming::{file_name, kind_for_stem};
use crate::json_source::JsonRecordSource;

/// Supported input directory layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// One `.csv` file per kind
    Csv,
    /// One `.json` array per kind
    Json,
}

/// Confidence level for format detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    /// Kind files exist, but no node file
    Low,
    /// Node file present
    High,
}

/// Options that only some formats use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    pub csv_delimiter: u8,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self { csv_delimiter: b',' }
    }
}

impl SourceFormat {
    pub const ALL: &'static [SourceFormat] = &[SourceFormat::Csv, SourceFormat::Json];

    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Json => "json",
        }
    }

    pub fn friendly_name(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "CSV directory",
            SourceFormat::Json => "JSON directory",
        }
    }

    /// Number of kind files of this format inside `dir`.
    fn kind_files(&self, dir: &Path) -> usize {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension()))
            })
            .filter(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(kind_for_stem)
                    .is_some()
            })
            .count()
    }

    /// Detect the format of a directory from the kind files it contains.
    ///
    /// The format with the most kind files wins; ties go to CSV.
    pub fn detect(dir: &Path) -> Option<(SourceFormat, Confidence)> {
        let mut best: Option<(SourceFormat, usize)> = None;
        for format in Self::ALL {
            let count = format.kind_files(dir);
            if count > 0 && best.map_or(true, |(_, most)| count > most) {
                best = Some((*format, count));
            }
        }
        let (format, _) = best?;
        let confidence = if dir
            .join(file_name(EntityKind::Node, format.extension()))
            .is_file()
        {
            Confidence::High
        } else {
            Confidence::Low
        };
        Some((format, confidence))
    }

    /// Source adapter reading `dir` in this format.
    pub fn open(&self, dir: &Path, options: SourceOptions) -> Box<dyn RawRecordSource> {
        match self {
            SourceFormat::Csv => {
                Box::new(CsvRecordSource::new(dir).with_delimiter(options.csv_delimiter))
            }
            SourceFormat::Json => Box::new(JsonRecordSource::new(dir)),
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.friendly_name())
    }
}

impl std::str::FromStr for SourceFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "json" => Ok(SourceFormat::Json),
            _ => bail!("Unknown format: {}. Supported: csv, json", s),
        }
    }
}

/// Open an input directory, detecting the format unless one is given.
pub fn open_source(
    dir: &Path,
    format: Option<SourceFormat>,
    options: SourceOptions,
) -> Result<(SourceFormat, Box<dyn RawRecordSource>)> {
    let metadata = std::fs::metadata(dir)
        .with_context(|| format!("reading input directory {}", dir.display()))?;
    if !metadata.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let format = match format {
        Some(format) => format,
        None => {
            let (format, confidence) = SourceFormat::detect(dir).with_context(|| {
                format!("no csv or json input files found in {}", dir.display())
            })?;
            if confidence == Confidence::Low {
                tracing::warn!(dir = %dir.display(), %format, "detected format without node file");
            }
            format
        }
    };
    Ok((format, format.open(dir, options)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_detect_by_kind_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(SourceFormat::detect(dir.path()), None);

        fs::write(dir.path().join("line_input.json"), "[]").unwrap();
        fs::write(dir.path().join("notes.csv"), "").unwrap();
        assert_eq!(
            SourceFormat::detect(dir.path()),
            Some((SourceFormat::Json, Confidence::Low))
        );

        fs::write(dir.path().join("node_input.json"), "[]").unwrap();
        assert_eq!(
            SourceFormat::detect(dir.path()),
            Some((SourceFormat::Json, Confidence::High))
        );
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("CSV".parse::<SourceFormat>().unwrap(), SourceFormat::Csv);
        assert_eq!("json".parse::<SourceFormat>().unwrap(), SourceFormat::Json);
        assert!("xml".parse::<SourceFormat>().is_err());
    }

    #[test]
    fn test_open_source_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("node_input.csv");
        fs::write(&file, "uuid\n").unwrap();
        assert!(open_source(&file, None, SourceOptions::default()).is_err());

        let (format, source) = open_source(dir.path(), None, SourceOptions::default()).unwrap();
        assert_eq!(format, SourceFormat::Csv);
        assert!(source.fetch(EntityKind::Node).unwrap().is_empty());
        assert!(open_source(&dir.path().join("missing"), None, SourceOptions::default()).is_err());
    }
}
