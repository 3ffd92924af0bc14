//! Error taxonomy of the ingestion pipeline.
//!
//! Per-record failures are [`IngestError`] values; they never cross record
//! boundaries as panics and are folded per entity kind into one
//! [`AggregateError`]. Fetching a kind can fail as a whole with a
//! [`SourceError`], which only short-circuits that kind. [`KindFailure`] is
//! what an assembler reports for a kind that did not come through.
//!
//! # Example
//!
//! ```
//! use psdm_core::error::{IngestError, IngestResult};
//!
//! fn lookup(id: &str) -> IngestResult<()> {
//!     Err(IngestError::DanglingReference { id: id.to_string() })
//! }
//!
//! assert!(lookup("4ca90220").unwrap_err().to_string().contains("4ca90220"));
//! ```

use thiserror::Error;
use uuid::Uuid;

use crate::units::QuantityKind;
use crate::EntityKind;

/// Convenience type alias for per-record outcomes.
pub type IngestResult<T> = Result<T, IngestError>;

/// Failure of the unit normalization table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitMappingError {
    /// No table entry exists for the field.
    #[error("no unit mapping for field '{field}'")]
    Unmapped { field: String },

    /// The raw value is not a finite number.
    #[error("value '{value}' of field '{field}' is not a finite number")]
    NotANumber { field: String, value: String },

    /// The table maps the field to another quantity than the caller asked for.
    #[error("field '{field}' holds {found}, expected {expected}")]
    KindMismatch {
        field: String,
        expected: QuantityKind,
        found: QuantityKind,
    },
}

/// Why a single raw value could not be coerced into its typed form.
#[derive(Error, Debug)]
pub enum CoercionCause {
    #[error("invalid uuid: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("invalid number: {0}")]
    Float(#[from] std::num::ParseFloatError),

    #[error("invalid integer: {0}")]
    Integer(#[from] std::num::ParseIntError),

    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("invalid boolean '{0}'")]
    Boolean(String),

    #[error("'{value}' is not one of {expected}")]
    Enum { value: String, expected: String },

    #[error("invalid geo json: {0}")]
    GeoJson(String),

    #[error(transparent)]
    Unit(#[from] UnitMappingError),

    #[error("{0}")]
    Constraint(String),
}

/// Outcome of converting one raw record (or one fragment group).
#[derive(Error, Debug)]
pub enum IngestError {
    /// None of the kind's field-set variants is covered by the record.
    #[error(
        "no matching field set for {kind}: present fields [{}], attempted variants {}",
        .present.join(", "),
        format_variants(.attempted)
    )]
    NoMatchingFieldSet {
        kind: EntityKind,
        present: Vec<String>,
        attempted: Vec<Vec<String>>,
    },

    /// A field of the chosen variant could not be coerced.
    #[error("cannot convert field '{field}': {cause}")]
    FieldCoercion {
        field: String,
        #[source]
        cause: CoercionCause,
    },

    /// Standalone unit normalization failure.
    #[error(transparent)]
    UnitMapping(#[from] UnitMappingError),

    /// A foreign key points to nothing registered in this run.
    #[error("dangling reference: no entity registered under '{id}'")]
    DanglingReference { id: String },

    /// An id is already taken by a different entity.
    #[error("duplicate id '{id}'")]
    DuplicateId { id: String },

    /// A multi-part group ended with fewer fragments than expected.
    #[error("incomplete group {key}: found {found} of {expected} fragments")]
    IncompleteGroup {
        key: Uuid,
        found: usize,
        expected: usize,
    },

    /// Fragments of one group contradict each other.
    #[error("inconsistent group {key}: {reason}")]
    InconsistentGroup { key: Uuid, reason: String },

    /// An edge would connect a node to itself.
    #[error("invalid connection of {uuid}: {reason}")]
    InvalidConnection { uuid: Uuid, reason: String },

    /// The conversion panicked; the payload message is kept.
    #[error("conversion panicked: {0}")]
    Panicked(String),
}

impl IngestError {
    /// Shorthand for a [`IngestError::FieldCoercion`].
    pub fn coercion(field: impl Into<String>, cause: impl Into<CoercionCause>) -> Self {
        IngestError::FieldCoercion {
            field: field.into(),
            cause: cause.into(),
        }
    }
}

fn format_variants(variants: &[Vec<String>]) -> String {
    variants
        .iter()
        .map(|fields| format!("{{{}}}", fields.join(", ")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a [`crate::source::RawRecordSource`] while fetching one kind.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The backing store could not be reached (connectivity, timeout).
    #[error("source unavailable for {kind}: {message}")]
    Unavailable { kind: EntityKind, message: String },

    /// Reading the kind's data failed.
    #[error("I/O error while reading {kind}: {source}")]
    Io {
        kind: EntityKind,
        #[source]
        source: std::io::Error,
    },

    /// The kind's data exists but is not in the expected shape.
    #[error("malformed {kind} data: {message}")]
    Malformed { kind: EntityKind, message: String },
}

/// Summary of a batch in which at least one record failed.
#[derive(Error, Debug)]
#[error(
    "{failed} exception(s) occurred within \"{label}\" data ({total} records), one or more fields or related entities could not be converted. Example: {first}"
)]
pub struct AggregateError {
    /// Name of the entity kind the batch was converting.
    pub label: String,
    /// Number of failed records.
    pub failed: usize,
    /// Number of records in the batch.
    pub total: usize,
    /// First failure encountered, as a debugging hint.
    #[source]
    pub first: Box<IngestError>,
}

/// Why a whole entity kind is reported as failed.
#[derive(Error, Debug)]
pub enum KindFailure {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Records(#[from] AggregateError),
}

impl KindFailure {
    /// Number of failed records, `None` when the fetch itself failed.
    pub fn failed_records(&self) -> Option<usize> {
        match self {
            KindFailure::Source(_) => None,
            KindFailure::Records(err) => Some(err.failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_matching_field_set_names_variants() {
        let err = IngestError::NoMatchingFieldSet {
            kind: EntityKind::Switch,
            present: vec!["uuid".into()],
            attempted: vec![vec!["uuid".into(), "id".into()], vec!["uuid".into()]],
        };
        let text = err.to_string();
        assert!(text.contains("switch"));
        assert!(text.contains("{uuid, id}, {uuid}"));
    }

    #[test]
    fn test_coercion_keeps_source() {
        let parse = "abc".parse::<f64>().unwrap_err();
        let err = IngestError::coercion("length", parse);
        assert!(err.to_string().starts_with("cannot convert field 'length'"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_aggregate_message_reports_count() {
        let err = AggregateError {
            label: "LineInput".into(),
            failed: 3,
            total: 10,
            first: Box::new(IngestError::DuplicateId { id: "x".into() }),
        };
        let text = err.to_string();
        assert!(text.starts_with("3 exception(s)"));
        assert!(text.contains("\"LineInput\""));
        assert!(text.contains("duplicate id 'x'"));
    }

    #[test]
    fn test_kind_failure_counts() {
        let source = KindFailure::from(SourceError::Unavailable {
            kind: EntityKind::Line,
            message: "timeout".into(),
        });
        assert_eq!(source.failed_records(), None);
        assert!(source.to_string().contains("timeout"));
    }
}
