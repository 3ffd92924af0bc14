//! The assembled, cross-referenced grid.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::diagnostics::Diagnostics;
use crate::graph_utils::find_islands;
use crate::{
    Connector, EntityKind, LineGraphicInput, LineInput, NodeGraphicInput, NodeInput, SwitchInput,
    Transformer2WInput, Transformer3WInput, UniqueEntity,
};

/// Immutable result of one assembly run: every kind as its own collection.
#[derive(Debug, Clone, Default)]
pub struct GridTopology {
    pub nodes: Vec<Arc<NodeInput>>,
    pub lines: Vec<Arc<LineInput>>,
    pub switches: Vec<Arc<SwitchInput>>,
    pub transformers_2w: Vec<Arc<Transformer2WInput>>,
    pub transformers_3w: Vec<Arc<Transformer3WInput>>,
    pub node_graphics: Vec<Arc<NodeGraphicInput>>,
    pub line_graphics: Vec<Arc<LineGraphicInput>>,
}

fn ids<T: UniqueEntity>(entities: &[Arc<T>]) -> impl Iterator<Item = (EntityKind, Uuid)> + '_ {
    entities.iter().map(|entity| (T::KIND, entity.uuid()))
}

fn connections<T: Connector>(
    entities: &[Arc<T>],
) -> impl Iterator<Item = (EntityKind, Uuid, Vec<&Arc<NodeInput>>)> + '_ {
    entities
        .iter()
        .map(|entity| (T::KIND, entity.uuid(), entity.nodes()))
}

impl GridTopology {
    /// Number of entities of one kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Node => self.nodes.len(),
            EntityKind::Line => self.lines.len(),
            EntityKind::Switch => self.switches.len(),
            EntityKind::Transformer2W => self.transformers_2w.len(),
            EntityKind::Transformer3W => self.transformers_3w.len(),
            EntityKind::NodeGraphic => self.node_graphics.len(),
            EntityKind::LineGraphic => self.line_graphics.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        EntityKind::ALL.iter().all(|kind| self.count(*kind) == 0)
    }

    /// Lines, switches and transformers.
    pub fn connector_count(&self) -> usize {
        self.lines.len() + self.switches.len() + self.transformers_2w.len() + self.transformers_3w.len()
    }

    /// Kind, uuid and connected nodes of every connector.
    pub fn connectors(&self) -> impl Iterator<Item = (EntityKind, Uuid, Vec<&Arc<NodeInput>>)> + '_ {
        connections(&self.lines)
            .chain(connections(&self.switches))
            .chain(connections(&self.transformers_2w))
            .chain(connections(&self.transformers_3w))
    }

    /// Kind and uuid of every entity, in build order.
    pub fn entity_ids(&self) -> impl Iterator<Item = (EntityKind, Uuid)> + '_ {
        ids(&self.nodes)
            .chain(ids(&self.lines))
            .chain(ids(&self.switches))
            .chain(ids(&self.transformers_2w))
            .chain(ids(&self.transformers_3w))
            .chain(ids(&self.node_graphics))
            .chain(ids(&self.line_graphics))
    }

    pub fn node(&self, uuid: &Uuid) -> Option<&Arc<NodeInput>> {
        self.nodes.iter().find(|node| node.uuid == *uuid)
    }

    /// Structural checks of the assembled graph.
    ///
    /// Uuids shared across kinds are errors. A missing slack node, isolated
    /// nodes and a grid split into several islands are warnings.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let mut seen: HashMap<Uuid, EntityKind> = HashMap::new();
        for (kind, uuid) in self.entity_ids() {
            if let Some(first) = seen.insert(uuid, kind) {
                diag.add_error_with_entity(
                    "uniqueness",
                    &format!("uuid is used by a {first} and a {kind}"),
                    &uuid.to_string(),
                );
            }
        }

        if self.nodes.is_empty() {
            return;
        }

        if !self.nodes.iter().any(|node| node.slack) {
            diag.add_warning("topology", "no slack node");
        }

        let mut degree: HashMap<Uuid, usize> = HashMap::new();
        for (_, _, nodes) in self.connectors() {
            for node in nodes {
                *degree.entry(node.uuid).or_default() += 1;
            }
        }
        for node in &self.nodes {
            if !degree.contains_key(&node.uuid) {
                diag.add_warning_with_entity("topology", "isolated node", &node.id);
            }
        }

        let islands = find_islands(self).islands;
        if islands.len() > 1 {
            diag.add_warning(
                "topology",
                &format!("grid is split into {} islands", islands.len()),
            );
        }
    }
}
