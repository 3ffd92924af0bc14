//! Run-scoped index from identifier to already-built entity.
//!
//! Builders of edge entities turn foreign keys into shared references through
//! a [`ReferenceResolver`]. The resolver is filled by a single writer during
//! the node phase and is only read afterwards, so it can be shared by
//! reference across worker threads. It never performs I/O.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{IngestError, IngestResult};
use crate::NodeInput;

/// Resolver over the nodes of one assembly run.
pub type NodeResolver = ReferenceResolver<NodeInput>;

/// Identifier → shared entity map with identity-based collision detection.
#[derive(Debug)]
pub struct ReferenceResolver<T, K = Uuid> {
    entries: HashMap<K, Arc<T>>,
}

impl<T, K> Default for ReferenceResolver<T, K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T, K> ReferenceResolver<T, K>
where
    K: Eq + Hash + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-allocate for the expected number of entities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Store `entity` under `id`.
    ///
    /// Registering the same instance twice is a no-op; registering a
    /// different instance under a taken id fails with
    /// [`IngestError::DuplicateId`] and keeps the first registration.
    pub fn register(&mut self, id: K, entity: Arc<T>) -> IngestResult<()> {
        match self.entries.get(&id) {
            Some(existing) if Arc::ptr_eq(existing, &entity) => Ok(()),
            Some(_) => Err(IngestError::DuplicateId { id: id.to_string() }),
            None => {
                self.entries.insert(id, entity);
                Ok(())
            }
        }
    }

    /// The instance registered under `id`.
    pub fn resolve(&self, id: &K) -> IngestResult<Arc<T>> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| IngestError::DanglingReference { id: id.to_string() })
    }

    pub fn contains(&self, id: &K) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
