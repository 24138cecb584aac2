use super::{PathPlanner, PlannerContext};
use crate::common::DomainResult;
use crate::domains::roadmap::EdgeDirection;

/// Probabilistic roadmap: one valid sample per step, connected to its
/// nearest neighbours within the connection radius.
#[derive(Debug, Clone, Default)]
pub struct PrmPlanner;

impl PathPlanner for PrmPlanner {
    fn name(&self) -> &str {
        "PRM"
    }

    fn one_step(&mut self, ctx: &mut PlannerContext<'_>) -> DomainResult<()> {
        let Some(q) = ctx.sample_valid() else {
            return Ok(());
        };
        let id = ctx.roadmap.add_node(q.clone());
        let neighbours = ctx.roadmap.k_nearest(&q, ctx.params.neighbours + 1);
        for (node, distance) in neighbours {
            if node == id || distance > ctx.params.connection_radius {
                continue;
            }
            if ctx.cancelled() {
                return Ok(());
            }
            if ctx.roadmap.mutually_reachable(node, id) {
                continue;
            }
            let from = ctx.roadmap.node(node)?.config.clone();
            if let Some(path) = ctx.local.connect(&from, &q)? {
                ctx.roadmap.add_edge(node, id, path, EdgeDirection::BothWays, None)?;
            }
        }
        Ok(())
    }
}
