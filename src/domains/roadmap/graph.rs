use crate::common::{Configuration, DomainError, DomainResult};
use crate::domains::paths::{Path, PathId};
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

pub type NodeId = usize;
pub type EdgeId = usize;
pub type ComponentId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeDirection {
    BothWays,
    OneWay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapNode {
    pub config: Configuration,
    pub component: ComponentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapEdge {
    pub path: Path,
    pub direction: EdgeDirection,
    /// Path bank entry this edge was built from, if any.
    pub path_id: Option<PathId>,
}

/// Read-only view of an edge with its endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeView {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub from_config: Configuration,
    pub to_config: Configuration,
    pub direction: EdgeDirection,
    pub path_id: Option<PathId>,
    pub component: ComponentId,
}

/// Graph of explored configurations.
///
/// Every node carries the id of its connected component. Component ids are
/// dense: when two components merge the lower id survives and every id above
/// the removed one shifts down by one. Edge direction never matters for
/// component membership.
#[derive(Debug, Clone, Default)]
pub struct Roadmap {
    pub(crate) graph: Graph<RoadmapNode, RoadmapEdge>,
    pub(crate) components: Vec<Vec<NodeId>>,
    pub(crate) init_node: Option<NodeId>,
    pub(crate) goal_nodes: Vec<NodeId>,
}

impl Roadmap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Adds an isolated node in a fresh component.
    pub fn add_node(&mut self, config: Configuration) -> NodeId {
        let component = self.components.len();
        let id = self.graph.add_node(RoadmapNode { config, component }).index();
        self.components.push(vec![id]);
        id
    }

    pub fn find_node(&self, config: &Configuration) -> Option<NodeId> {
        self.graph
            .node_indices()
            .find(|&n| self.graph[n].config == *config)
            .map(|n| n.index())
    }

    /// Returns the node holding exactly `config`, inserting it if needed.
    pub fn add_or_get_node(&mut self, config: Configuration) -> NodeId {
        match self.find_node(&config) {
            Some(id) => id,
            None => self.add_node(config),
        }
    }

    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        path: Path,
        direction: EdgeDirection,
        path_id: Option<PathId>,
    ) -> DomainResult<EdgeId> {
        self.check_node(from)?;
        self.check_node(to)?;
        let id = self
            .graph
            .add_edge(NodeIndex::new(from), NodeIndex::new(to), RoadmapEdge { path, direction, path_id })
            .index();
        self.merge_components(self.graph[NodeIndex::new(from)].component, self.graph[NodeIndex::new(to)].component);
        Ok(id)
    }

    fn merge_components(&mut self, a: ComponentId, b: ComponentId) {
        if a == b {
            return;
        }
        let (keep, remove) = if a < b { (a, b) } else { (b, a) };
        let moved = self.components.remove(remove);
        self.components[keep].extend(moved);
        for node in self.graph.node_weights_mut() {
            if node.component == remove {
                node.component = keep;
            } else if node.component > remove {
                node.component -= 1;
            }
        }
        tracing::debug!(keep, remove, components = self.components.len(), "merged roadmap components");
    }

    pub fn node(&self, id: NodeId) -> DomainResult<&RoadmapNode> {
        self.graph
            .node_weight(NodeIndex::new(id))
            .ok_or(DomainError::UnknownNode { id })
    }

    pub fn edge(&self, id: EdgeId) -> DomainResult<EdgeView> {
        let index = EdgeIndex::new(id);
        let (from, to) = self.graph.edge_endpoints(index).ok_or(DomainError::UnknownEdge { id })?;
        let weight = &self.graph[index];
        Ok(EdgeView {
            id,
            from: from.index(),
            to: to.index(),
            from_config: self.graph[from].config.clone(),
            to_config: self.graph[to].config.clone(),
            direction: weight.direction,
            path_id: weight.path_id,
            component: self.graph[from].component,
        })
    }

    pub fn edge_path(&self, id: EdgeId) -> DomainResult<&Path> {
        self.graph
            .edge_weight(EdgeIndex::new(id))
            .map(|e| &e.path)
            .ok_or(DomainError::UnknownEdge { id })
    }

    pub fn nodes(&self) -> Vec<Configuration> {
        self.graph.node_weights().map(|n| n.config.clone()).collect()
    }

    pub fn nodes_in_component(&self, component: i64) -> DomainResult<Vec<Configuration>> {
        let members = usize::try_from(component)
            .ok()
            .and_then(|cc| self.components.get(cc))
            .ok_or(DomainError::UnknownComponent { id: component })?;
        Ok(members.iter().map(|&n| self.graph[NodeIndex::new(n)].config.clone()).collect())
    }

    pub fn component_of_node(&self, id: NodeId) -> DomainResult<ComponentId> {
        Ok(self.node(id)?.component)
    }

    pub fn component_of_edge(&self, id: EdgeId) -> DomainResult<ComponentId> {
        Ok(self.edge(id)?.component)
    }

    pub fn same_component(&self, a: NodeId, b: NodeId) -> bool {
        match (self.node(a), self.node(b)) {
            (Ok(x), Ok(y)) => x.component == y.component,
            _ => false,
        }
    }

    /// Nearest node to `q`, restricted to component `component` when it is
    /// non-negative. `None` when there is nothing to search.
    pub fn nearest_node(&self, q: &Configuration, component: i64) -> DomainResult<Option<(NodeId, f64)>> {
        let candidates: Vec<NodeId> = if component >= 0 {
            self.components
                .get(component as usize)
                .cloned()
                .ok_or(DomainError::UnknownComponent { id: component })?
        } else {
            self.graph.node_indices().map(|n| n.index()).collect()
        };
        Ok(candidates
            .into_iter()
            .map(|n| (n, self.graph[NodeIndex::new(n)].config.distance(q)))
            .min_by(|a, b| a.1.total_cmp(&b.1)))
    }

    pub fn nearest_config(&self, q: &Configuration, component: i64) -> DomainResult<Option<(Configuration, f64)>> {
        Ok(self
            .nearest_node(q, component)?
            .map(|(n, d)| (self.graph[NodeIndex::new(n)].config.clone(), d)))
    }

    /// Up to `k` nodes closest to `q`, nearest first.
    pub fn k_nearest(&self, q: &Configuration, k: usize) -> Vec<(NodeId, f64)> {
        let mut all: Vec<(NodeId, f64)> = self
            .graph
            .node_indices()
            .map(|n| (n.index(), self.graph[n].config.distance(q)))
            .collect();
        all.sort_by(|a, b| a.1.total_cmp(&b.1));
        all.truncate(k);
        all
    }

    pub fn set_init_node(&mut self, id: NodeId) -> DomainResult<()> {
        self.check_node(id)?;
        self.init_node = Some(id);
        Ok(())
    }

    pub fn add_goal_node(&mut self, id: NodeId) -> DomainResult<()> {
        self.check_node(id)?;
        if !self.goal_nodes.contains(&id) {
            self.goal_nodes.push(id);
        }
        Ok(())
    }

    pub fn init_node(&self) -> Option<NodeId> {
        self.init_node
    }

    pub fn goal_nodes(&self) -> &[NodeId] {
        &self.goal_nodes
    }

    pub fn reset_query(&mut self) {
        self.init_node = None;
        self.goal_nodes.clear();
    }

    /// Whether some goal can be reached from the init node along edges
    /// traversed in their allowed direction.
    pub fn init_connected_to_goal(&self) -> bool {
        match self.init_node {
            Some(init) => self.goal_nodes.iter().any(|&g| self.reaches(init, g)),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.components.clear();
        self.reset_query();
    }

    /// Edges that can be traversed leaving `node`, with the node they reach.
    pub(crate) fn traversable_edges(&self, node: NodeId) -> Vec<(EdgeId, NodeId, bool)> {
        let index = NodeIndex::new(node);
        let forward = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|e| (e.id().index(), e.target().index(), false));
        let backward = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .filter(|e| e.weight().direction == EdgeDirection::BothWays)
            .map(|e| (e.id().index(), e.source().index(), true));
        forward.chain(backward).collect()
    }

    fn check_node(&self, id: NodeId) -> DomainResult<()> {
        self.node(id).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(x: f64) -> Configuration {
        Configuration::new(vec![x])
    }

    fn segment(a: f64, b: f64) -> Path {
        Path::straight(&q(a), &q(b)).unwrap()
    }

    #[test]
    fn test_merge_keeps_lower_id_and_shifts_the_rest() {
        let mut roadmap = Roadmap::new();
        for x in 0..4 {
            roadmap.add_node(q(x as f64));
        }
        assert_eq!(roadmap.component_count(), 4);

        roadmap.add_edge(1, 3, segment(1.0, 3.0), EdgeDirection::OneWay, None).unwrap();
        assert_eq!(roadmap.component_count(), 3);
        assert_eq!(roadmap.component_of_node(3).unwrap(), 1);
        assert_eq!(roadmap.component_of_node(2).unwrap(), 2);

        roadmap.add_edge(2, 0, segment(2.0, 0.0), EdgeDirection::BothWays, None).unwrap();
        assert_eq!(roadmap.component_count(), 2);
        assert_eq!(roadmap.component_of_node(2).unwrap(), 0);
        assert_eq!(roadmap.nodes_in_component(1).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_indices_are_reported() {
        let mut roadmap = Roadmap::new();
        roadmap.add_node(q(0.0));
        assert!(matches!(roadmap.node(4), Err(DomainError::UnknownNode { id: 4 })));
        assert!(matches!(roadmap.edge(0), Err(DomainError::UnknownEdge { id: 0 })));
        assert!(matches!(roadmap.nodes_in_component(-2), Err(DomainError::UnknownComponent { .. })));
        assert!(roadmap.add_edge(0, 9, segment(0.0, 1.0), EdgeDirection::OneWay, None).is_err());
        assert_eq!(roadmap.edge_count(), 0);
    }

    #[test]
    fn test_nearest_config_by_component() {
        let mut roadmap = Roadmap::new();
        roadmap.add_node(q(0.0));
        roadmap.add_node(q(5.0));
        let (near, d) = roadmap.nearest_config(&q(4.0), -1).unwrap().unwrap();
        assert_eq!(near, q(5.0));
        assert!((d - 1.0).abs() < 1e-12);
        let (near, _) = roadmap.nearest_config(&q(4.0), 0).unwrap().unwrap();
        assert_eq!(near, q(0.0));
    }

    #[test]
    fn test_clear_empty_roadmap() {
        let mut roadmap = Roadmap::new();
        roadmap.clear();
        assert_eq!(roadmap.node_count(), 0);
        assert_eq!(roadmap.edge_count(), 0);
        assert_eq!(roadmap.component_count(), 0);
    }
}
