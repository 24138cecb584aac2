use super::graph::{NodeId, Roadmap};
use crate::common::DomainResult;
use crate::domains::paths::Path;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

impl Roadmap {
    /// Directed reachability. Sharing a component is necessary but not
    /// sufficient once one-way edges are involved.
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        if !self.same_component(from, to) {
            return false;
        }
        if from == to {
            return true;
        }
        let mut seen = vec![false; self.node_count()];
        let mut queue = VecDeque::from([from]);
        seen[from] = true;
        while let Some(u) = queue.pop_front() {
            for (_, v, _) in self.traversable_edges(u) {
                if v == to {
                    return true;
                }
                if !seen[v] {
                    seen[v] = true;
                    queue.push_back(v);
                }
            }
        }
        false
    }

    /// Both nodes reach each other, so a new two-way edge between them adds
    /// no connectivity.
    pub fn mutually_reachable(&self, a: NodeId, b: NodeId) -> bool {
        self.reaches(a, b) && self.reaches(b, a)
    }

    /// Shortest path from `from` to `to` that respects edge direction, built by
    /// concatenating the local paths stored on the traversed edges.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> DomainResult<Option<Path>> {
        self.node(from)?;
        self.node(to)?;
        if from == to {
            return Ok(Some(Path::new(vec![self.node(from)?.config.clone()])?));
        }

        let n = self.node_count();
        let mut dist = vec![f64::INFINITY; n];
        let mut previous: Vec<Option<(NodeId, usize, bool)>> = vec![None; n];
        let mut heap = BinaryHeap::new();
        dist[from] = 0.0;
        heap.push(Reverse((OrderedFloat(0.0), from)));

        while let Some(Reverse((OrderedFloat(d), u))) = heap.pop() {
            if u == to {
                break;
            }
            if d > dist[u] {
                continue;
            }
            for (edge, v, reversed) in self.traversable_edges(u) {
                let next = d + self.edge_path(edge)?.length();
                if next < dist[v] {
                    dist[v] = next;
                    previous[v] = Some((u, edge, reversed));
                    heap.push(Reverse((OrderedFloat(next), v)));
                }
            }
        }

        if !dist[to].is_finite() {
            return Ok(None);
        }
        let mut hops = Vec::new();
        let mut current = to;
        while let Some((prev, edge, reversed)) = previous[current] {
            hops.push((edge, reversed));
            current = prev;
        }
        hops.reverse();

        let mut path = Path::new(vec![self.node(from)?.config.clone()])?;
        for (edge, reversed) in hops {
            let local = self.edge_path(edge)?;
            if reversed {
                path.concatenate(&local.reversed())?;
            } else {
                path.concatenate(local)?;
            }
        }
        Ok(Some(path))
    }

    /// Shortest path from the init node to the closest reachable goal node.
    pub fn solution_path(&self) -> DomainResult<Option<Path>> {
        let Some(init) = self.init_node else {
            return Ok(None);
        };
        let mut best: Option<Path> = None;
        for &goal in &self.goal_nodes {
            if !self.reaches(init, goal) {
                continue;
            }
            if let Some(candidate) = self.shortest_path(init, goal)? {
                if best.as_ref().map_or(true, |b| candidate.length() < b.length()) {
                    best = Some(candidate);
                }
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::super::graph::EdgeDirection;
    use super::*;
    use crate::common::Configuration;

    fn q(x: f64, y: f64) -> Configuration {
        Configuration::new(vec![x, y])
    }

    #[test]
    fn test_one_way_edges_are_not_traversed_backwards() {
        let mut roadmap = Roadmap::new();
        let a = roadmap.add_node(q(0.0, 0.0));
        let b = roadmap.add_node(q(1.0, 0.0));
        roadmap
            .add_edge(b, a, Path::straight(&q(1.0, 0.0), &q(0.0, 0.0)).unwrap(), EdgeDirection::OneWay, None)
            .unwrap();

        assert!(roadmap.same_component(a, b));
        assert!(roadmap.shortest_path(a, b).unwrap().is_none());
        assert!(roadmap.shortest_path(b, a).unwrap().is_some());
        assert!(roadmap.reaches(b, a));
        assert!(!roadmap.reaches(a, b));
        assert!(!roadmap.mutually_reachable(a, b));
    }

    #[test]
    fn test_goal_behind_a_one_way_edge_is_not_reached() {
        let mut roadmap = Roadmap::new();
        let init = roadmap.add_node(q(-3.0, 0.0));
        let goal = roadmap.add_node(q(3.0, 0.0));
        roadmap
            .add_edge(goal, init, Path::straight(&q(3.0, 0.0), &q(-3.0, 0.0)).unwrap(), EdgeDirection::OneWay, None)
            .unwrap();
        roadmap.set_init_node(init).unwrap();
        roadmap.add_goal_node(goal).unwrap();

        assert_eq!(roadmap.component_count(), 1);
        assert!(!roadmap.init_connected_to_goal());
        assert!(roadmap.solution_path().unwrap().is_none());

        roadmap
            .add_edge(init, goal, Path::straight(&q(-3.0, 0.0), &q(3.0, 0.0)).unwrap(), EdgeDirection::OneWay, None)
            .unwrap();
        assert!(roadmap.init_connected_to_goal());
        assert!(roadmap.mutually_reachable(init, goal));
        assert_eq!(roadmap.solution_path().unwrap().unwrap().end(), &q(3.0, 0.0));
    }

    #[test]
    fn test_both_ways_edge_is_reversed_when_needed() {
        let mut roadmap = Roadmap::new();
        let a = roadmap.add_node(q(0.0, 0.0));
        let b = roadmap.add_node(q(1.0, 0.0));
        let c = roadmap.add_node(q(1.0, 1.0));
        roadmap
            .add_edge(b, a, Path::straight(&q(1.0, 0.0), &q(0.0, 0.0)).unwrap(), EdgeDirection::BothWays, None)
            .unwrap();
        roadmap
            .add_edge(b, c, Path::straight(&q(1.0, 0.0), &q(1.0, 1.0)).unwrap(), EdgeDirection::BothWays, None)
            .unwrap();

        roadmap.set_init_node(a).unwrap();
        roadmap.add_goal_node(c).unwrap();
        let path = roadmap.solution_path().unwrap().unwrap();
        assert_eq!(path.start(), &q(0.0, 0.0));
        assert_eq!(path.end(), &q(1.0, 1.0));
        assert!((path.length() - 2.0).abs() < 1e-12);
    }
}
