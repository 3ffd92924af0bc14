//! Where raw records come from.
//!
//! Adapters for concrete stores (CSV, JSON, databases) implement
//! [`RawRecordSource`]; the assembler never sees anything but raw records.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SourceError;
use crate::record::RawRecord;
use crate::EntityKind;

/// Delivers all raw records of one entity kind.
pub trait RawRecordSource: Send + Sync {
    fn fetch(&self, kind: EntityKind) -> Result<Vec<RawRecord>, SourceError>;
}

impl<S: RawRecordSource + ?Sized> RawRecordSource for Box<S> {
    fn fetch(&self, kind: EntityKind) -> Result<Vec<RawRecord>, SourceError> {
        (**self).fetch(kind)
    }
}

impl<S: RawRecordSource + ?Sized> RawRecordSource for &S {
    fn fetch(&self, kind: EntityKind) -> Result<Vec<RawRecord>, SourceError> {
        (**self).fetch(kind)
    }
}

/// Records held in memory, grouped by kind. Useful for tests and for callers
/// that already parsed their input.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: BTreeMap<EntityKind, Vec<RawRecord>>,
    unavailable: BTreeSet<EntityKind>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the kind it is tagged with.
    pub fn push(&mut self, record: RawRecord) {
        self.records.entry(record.kind()).or_default().push(record);
    }

    /// Builder-style [`push`](Self::push) for several records.
    pub fn with_records(mut self, records: impl IntoIterator<Item = RawRecord>) -> Self {
        for record in records {
            self.push(record);
        }
        self
    }

    /// Make every fetch of `kind` fail with [`SourceError::Unavailable`].
    pub fn with_unavailable(mut self, kind: EntityKind) -> Self {
        self.unavailable.insert(kind);
        self
    }

    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RawRecordSource for InMemorySource {
    fn fetch(&self, kind: EntityKind) -> Result<Vec<RawRecord>, SourceError> {
        if self.unavailable.contains(&kind) {
            return Err(SourceError::Unavailable {
                kind,
                message: "kind marked unavailable".into(),
            });
        }
        Ok(self.records.get(&kind).cloned().unwrap_or_default())
    }
}
