use super::{PathPlanner, PlannerContext};
use crate::common::DomainResult;
use crate::domains::roadmap::{EdgeDirection, NodeId};

/// Grows every connected component towards a common random sample, then
/// links the new nodes across components.
#[derive(Debug, Clone, Default)]
pub struct DiffusingPlanner {
    steps: usize,
}

impl DiffusingPlanner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PathPlanner for DiffusingPlanner {
    fn name(&self) -> &str {
        "DiffusingPlanner"
    }

    fn one_step(&mut self, ctx: &mut PlannerContext<'_>) -> DomainResult<()> {
        self.steps += 1;
        let Some(target) = ctx.sample() else {
            return Ok(());
        };

        let mut new_nodes: Vec<NodeId> = Vec::new();
        // Merges only remove components above the one being extended.
        let component_count = ctx.roadmap.component_count();
        for component in 0..component_count {
            if ctx.cancelled() {
                return Ok(());
            }
            let Some((near, _)) = ctx.roadmap.nearest_node(&target, component as i64)? else {
                continue;
            };
            let from = ctx.roadmap.node(near)?.config.clone();
            let Some(path) = ctx.local.extend(&from, &target, ctx.params.extension_step)? else {
                continue;
            };
            if path.length() <= f64::EPSILON {
                continue;
            }
            let id = ctx.roadmap.add_node(path.end().clone());
            ctx.roadmap.add_edge(near, id, path, EdgeDirection::BothWays, None)?;
            new_nodes.push(id);
        }

        for (i, &a) in new_nodes.iter().enumerate() {
            for &b in &new_nodes[i + 1..] {
                if ctx.cancelled() {
                    return Ok(());
                }
                if ctx.roadmap.mutually_reachable(a, b) {
                    continue;
                }
                let qa = ctx.roadmap.node(a)?.config.clone();
                let qb = ctx.roadmap.node(b)?.config.clone();
                if let Some(path) = ctx.local.connect(&qa, &qb)? {
                    ctx.roadmap.add_edge(a, b, path, EdgeDirection::BothWays, None)?;
                }
            }
        }
        tracing::debug!(step = self.steps, added = new_nodes.len(), "diffusing step");
        Ok(())
    }
}
