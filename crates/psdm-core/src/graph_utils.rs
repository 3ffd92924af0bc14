use crate::topology::GridTopology;
use crate::{EntityKind, NodeInput};
use anyhow::{anyhow, Result};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

/// Edge of the topology graph: the connector kind and its uuid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphEdge {
    pub kind: EntityKind,
    pub uuid: Uuid,
}

/// Undirected node/connector graph of an assembled topology.
///
/// Three-winding transformers contribute the edges A-B and A-C.
#[derive(Debug, Default)]
pub struct GridGraph {
    pub graph: UnGraph<Arc<NodeInput>, GraphEdge>,
    index: HashMap<Uuid, NodeIndex>,
}

impl GridGraph {
    pub fn from_topology(topology: &GridTopology) -> Self {
        let mut graph = UnGraph::with_capacity(topology.nodes.len(), topology.connector_count());
        let mut index = HashMap::with_capacity(topology.nodes.len());
        for node in &topology.nodes {
            index
                .entry(node.uuid)
                .or_insert_with(|| graph.add_node(Arc::clone(node)));
        }
        for (kind, uuid, nodes) in topology.connectors() {
            let Some((first, rest)) = nodes.split_first() else {
                continue;
            };
            for other in rest {
                if let (Some(&a), Some(&b)) = (index.get(&first.uuid), index.get(&other.uuid)) {
                    graph.add_edge(a, b, GraphEdge { kind, uuid });
                }
            }
        }
        Self { graph, index }
    }

    /// Graph index of a node.
    pub fn node_index(&self, uuid: &Uuid) -> Option<NodeIndex> {
        self.index.get(uuid).copied()
    }
}

/// Summary statistics produced by `graph stats` (density/degree/connected components).
#[derive(Debug)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub density: f64,
}

/// Island summary used in `graph islands`.
#[derive(Debug)]
pub struct IslandSummary {
    pub island_id: usize,
    pub node_count: usize,
    pub has_slack: bool,
}

/// Island a node belongs to.
#[derive(Debug)]
pub struct NodeAssignment {
    pub uuid: Uuid,
    pub label: String,
    pub island_id: usize,
}

/// Aggregated island analysis result.
#[derive(Debug)]
pub struct IslandAnalysis {
    pub islands: Vec<IslandSummary>,
    pub assignments: Vec<NodeAssignment>,
}

/// Degree distribution, density and component count of the node graph.
pub fn graph_stats(topology: &GridTopology) -> GraphStats {
    let grid = GridGraph::from_topology(topology);
    let graph = &grid.graph;
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();
    let degrees: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.edges(node).count())
        .collect();
    let min_degree = degrees.iter().copied().min().unwrap_or(0);
    let max_degree = degrees.iter().copied().max().unwrap_or(0);
    let avg_degree = if node_count == 0 {
        0.0
    } else {
        degrees.iter().sum::<usize>() as f64 / node_count as f64
    };
    let density = if node_count < 2 {
        0.0
    } else {
        2.0 * edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
    };
    GraphStats {
        node_count,
        edge_count,
        connected_components: connected_components(graph),
        min_degree,
        avg_degree,
        max_degree,
        density,
    }
}

/// Labels connected components (breadth-first search), ordered by first node.
pub fn find_islands(topology: &GridTopology) -> IslandAnalysis {
    let grid = GridGraph::from_topology(topology);
    let graph = &grid.graph;
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    let mut assignments = Vec::new();
    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let island_id = islands.len();
        let mut queue = VecDeque::from([start]);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            members.push(node);
            queue.extend(graph.neighbors(node).filter(|n| !visited.contains(n)));
        }
        islands.push(IslandSummary {
            island_id,
            node_count: members.len(),
            has_slack: members.iter().any(|&node| graph[node].slack),
        });
        assignments.extend(members.into_iter().map(|node| NodeAssignment {
            uuid: graph[node].uuid,
            label: graph[node].id.clone(),
            island_id,
        }));
    }
    IslandAnalysis {
        islands,
        assignments,
    }
}

/// Export the topology to a DOT string (Graphviz).
pub fn export_graph(topology: &GridTopology, format: &str) -> Result<String> {
    match format.to_ascii_lowercase().as_str() {
        "graphviz" | "dot" => Ok(render_dot(&GridGraph::from_topology(topology))),
        other => Err(anyhow!("unsupported graph export format '{other}'")),
    }
}

fn render_dot(grid: &GridGraph) -> String {
    let mut buffer = String::from("graph psdm_grid {\n");
    for node in grid.graph.node_indices() {
        let label = sanitize_label(&grid.graph[node].id);
        buffer.push_str(&format!("  n{} [label=\"{}\"];\n", node.index(), label));
    }
    for edge in grid.graph.edge_references() {
        let source = edge.source().index();
        let target = edge.target().index();
        let kind = edge.weight().kind;
        buffer.push_str(&format!("  n{source} -- n{target} [label=\"{kind}\"];\n"));
    }
    buffer.push('}');
    buffer
}

fn sanitize_label(label: &str) -> String {
    label.replace('"', "\\\"")
}
