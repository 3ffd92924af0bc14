//! `~/.psdm/config.toml`: defaults for the `psdm` binary.
//!
//! ```toml
//! [assembly]
//! policy = "partial"
//! parallel = true
//!
//! [source]
//! format = "csv"
//! csv_delimiter = ";"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use psdm_core::AssemblyConfig;
use psdm_io::{SourceFormat, SourceOptions};
use serde::{Deserialize, Serialize};

use crate::cli::InputArgs;

/// `[source]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// `csv` or `json`; detected when absent
    pub format: Option<String>,
    pub csv_delimiter: char,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            format: None,
            csv_delimiter: ',',
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsdmConfig {
    pub assembly: AssemblyConfig,
    pub source: SourceConfig,
}

impl PsdmConfig {
    /// Get the default config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".psdm"))
    }

    /// Get the default config file path.
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Explicit file, else the default location, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Assembly settings with command-line overrides applied.
    pub fn assembly_for(&self, args: &InputArgs) -> AssemblyConfig {
        let mut config = self.assembly.clone();
        if let Some(policy) = args.policy {
            config.policy = policy;
        }
        if args.parallel {
            config.parallel = true;
        }
        if !args.kinds.is_empty() {
            config.kinds = args.kinds.clone();
        }
        config
    }

    /// Format fixed by the config file, if any.
    pub fn source_format(&self) -> Result<Option<SourceFormat>> {
        self.source
            .format
            .as_deref()
            .map(str::parse::<SourceFormat>)
            .transpose()
    }

    pub fn source_options(&self) -> Result<SourceOptions> {
        if !self.source.csv_delimiter.is_ascii() {
            bail!(
                "csv_delimiter must be a single ASCII character, got '{}'",
                self.source.csv_delimiter
            );
        }
        Ok(SourceOptions {
            csv_delimiter: self.source.csv_delimiter as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::InputFormat;
    use psdm_core::{AggregationPolicy, EntityKind};

    fn args() -> InputArgs {
        InputArgs {
            input: PathBuf::from("grid"),
            input_format: InputFormat::Auto,
            policy: None,
            parallel: false,
            kinds: Vec::new(),
        }
    }

    #[test]
    fn test_file_values_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[assembly]\npolicy = \"partial\"\n\n[source]\nformat = \"json\"\ncsv_delimiter = \";\"\n",
        )
        .unwrap();
        let config = PsdmConfig::load(Some(&path)).unwrap();
        assert_eq!(config.assembly.policy, AggregationPolicy::Partial);
        assert!(config.assembly.validate_topology);
        assert_eq!(config.source_format().unwrap(), Some(SourceFormat::Json));
        assert_eq!(config.source_options().unwrap().csv_delimiter, b';');

        let mut overrides = args();
        overrides.policy = Some(AggregationPolicy::AllOrNothing);
        overrides.kinds = vec![EntityKind::Node];
        let assembly = config.assembly_for(&overrides);
        assert_eq!(assembly.policy, AggregationPolicy::AllOrNothing);
        assert_eq!(assembly.kinds, vec![EntityKind::Node]);
    }

    #[test]
    fn test_defaults_without_file() {
        let config = PsdmConfig::default();
        assert_eq!(config.assembly_for(&args()), AssemblyConfig::default());
        assert_eq!(config.source_format().unwrap(), None);
    }

    #[test]
    fn test_bad_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[assembly]\npolicy = 3\n").unwrap();
        let err = PsdmConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }
}
