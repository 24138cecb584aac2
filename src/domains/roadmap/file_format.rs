//! Roadmap file layout:
//!
//! ```text
//! "RDMP" | version: u8 | header_len: u32 LE | JSON header | bincode payload
//! ```
//!
//! Version 0 files carry no header (`header_len` is 0) and a payload with the
//! graph only; components are rebuilt from connectivity when they are read.
//! Version 1 components are rebuilt too and must agree with the stored ones.

use super::graph::{ComponentId, NodeId, Roadmap, RoadmapEdge, RoadmapNode};
use crate::common::{DomainError, DomainResult};
use petgraph::graph::Graph;
use serde::{Deserialize, Serialize};

pub const MAGIC: &[u8; 4] = b"RDMP";
pub const FORMAT_VERSION: u8 = 1;
const PREFIX_LEN: usize = 4 + 1 + 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapHeader {
    pub format: String,
    pub version: u8,
    pub node_count: usize,
    pub edge_count: usize,
    pub component_count: usize,
    pub dimension: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct PayloadV1 {
    graph: Graph<RoadmapNode, RoadmapEdge>,
    components: Vec<Vec<NodeId>>,
    init_node: Option<NodeId>,
    goal_nodes: Vec<NodeId>,
}

pub fn encode(roadmap: &Roadmap) -> DomainResult<Vec<u8>> {
    let header = RoadmapHeader {
        format: "roadmap-bincode".to_string(),
        version: FORMAT_VERSION,
        node_count: roadmap.node_count(),
        edge_count: roadmap.edge_count(),
        component_count: roadmap.component_count(),
        dimension: roadmap.graph.node_weights().next().map(|n| n.config.dim()),
    };
    let header = serde_json::to_vec(&header)?;
    let payload = bincode::serialize(&PayloadV1 {
        graph: roadmap.graph.clone(),
        components: roadmap.components.clone(),
        init_node: roadmap.init_node,
        goal_nodes: roadmap.goal_nodes.clone(),
    })?;

    let mut bytes = Vec::with_capacity(PREFIX_LEN + header.len() + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> DomainResult<Roadmap> {
    if bytes.len() < PREFIX_LEN || &bytes[0..4] != MAGIC {
        return Err(DomainError::Serialization("not a roadmap file".to_string()));
    }
    let version = bytes[4];
    let header_len = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
    let payload_start = PREFIX_LEN + header_len;
    if bytes.len() < payload_start {
        return Err(DomainError::Serialization("truncated roadmap header".to_string()));
    }
    let payload = &bytes[payload_start..];

    match version {
        0 => {
            let graph: Graph<RoadmapNode, RoadmapEdge> = bincode::deserialize(payload)?;
            check_dimensions(&graph, None)?;
            rebuild_components(&graph)
        }
        1 => {
            let header: RoadmapHeader = serde_json::from_slice(&bytes[PREFIX_LEN..payload_start])?;
            let decoded: PayloadV1 = bincode::deserialize(payload)?;
            if decoded.graph.node_count() != header.node_count || decoded.graph.edge_count() != header.edge_count {
                return Err(DomainError::Serialization("roadmap header does not match payload".to_string()));
            }
            check_dimensions(&decoded.graph, header.dimension)?;
            restore(decoded)
        }
        other => Err(DomainError::Serialization(format!("unsupported roadmap version {}", other))),
    }
}

fn corrupt(reason: impl Into<String>) -> DomainError {
    DomainError::Serialization(reason.into())
}

/// All nodes and edge paths share one dimension, matching the header when it names one.
fn check_dimensions(graph: &Graph<RoadmapNode, RoadmapEdge>, expected: Option<usize>) -> DomainResult<()> {
    let Some(dim) = expected.or_else(|| graph.node_weights().next().map(|n| n.config.dim())) else {
        return Ok(());
    };
    if graph.node_weights().any(|n| n.config.dim() != dim) {
        return Err(corrupt(format!("roadmap nodes do not all have {} dofs", dim)));
    }
    if graph.edge_weights().any(|e| e.path.dim() != dim) {
        return Err(corrupt(format!("roadmap edge paths do not all have {} dofs", dim)));
    }
    Ok(())
}

/// Rebuilds the stored partition from connectivity and rejects the payload
/// when the two disagree. The stored member order is kept.
fn restore(decoded: PayloadV1) -> DomainResult<Roadmap> {
    let mut roadmap = rebuild_components(&decoded.graph)?;
    let stored: Vec<ComponentId> = decoded.graph.node_weights().map(|n| n.component).collect();
    let rebuilt: Vec<ComponentId> = roadmap.graph.node_weights().map(|n| n.component).collect();
    if stored != rebuilt || sorted_members(&decoded.components) != sorted_members(&roadmap.components) {
        return Err(corrupt("roadmap components do not match its edges"));
    }
    roadmap.components = decoded.components;

    if let Some(init) = decoded.init_node {
        roadmap
            .set_init_node(init)
            .map_err(|_| corrupt(format!("roadmap init node {} does not exist", init)))?;
    }
    for goal in decoded.goal_nodes {
        roadmap
            .add_goal_node(goal)
            .map_err(|_| corrupt(format!("roadmap goal node {} does not exist", goal)))?;
    }
    Ok(roadmap)
}

fn sorted_members(components: &[Vec<NodeId>]) -> Vec<Vec<NodeId>> {
    components
        .iter()
        .map(|members| {
            let mut members = members.clone();
            members.sort_unstable();
            members
        })
        .collect()
}

fn rebuild_components(graph: &Graph<RoadmapNode, RoadmapEdge>) -> DomainResult<Roadmap> {
    let mut roadmap = Roadmap::new();
    for node in graph.node_weights() {
        roadmap.add_node(node.config.clone());
    }
    for edge in graph.raw_edges() {
        roadmap.add_edge(
            edge.source().index(),
            edge.target().index(),
            edge.weight.path.clone(),
            edge.weight.direction,
            edge.weight.path_id,
        )?;
    }
    Ok(roadmap)
}
