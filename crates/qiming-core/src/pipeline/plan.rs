use serde::Serialize;

use crate::certainty::{AnalysisStrategy, CertaintyLevel, LevelSelection};
use crate::pipeline::context::ExecutionOptions;
use crate::pipeline::response::ExecutionMode;
use crate::plugin_system::graph::DependencyGraph;

/// Scheduling of one layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerPlan {
    pub layer: u8,
    pub name: &'static str,
    /// Groups run one after another; members of a group run concurrently
    pub groups: Vec<Vec<String>>,
}

impl LayerPlan {
    pub fn plugin_ids(&self) -> impl Iterator<Item = &String> {
        self.groups.iter().flatten()
    }
}

/// Dry-run view of how a request would execute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    pub request_id: String,
    pub level: CertaintyLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_selection: Option<LevelSelection>,
    pub strategy: AnalysisStrategy,
    pub mode: ExecutionMode,
    pub options: ExecutionOptions,
    /// Topological order of the selected plugins
    pub order: Vec<String>,
    pub layers: Vec<LayerPlan>,
    /// Configured for the level but not registered, active or enabled
    pub unavailable: Vec<String>,
    pub warnings: Vec<String>,
}

impl ExecutionPlan {
    pub fn plugin_count(&self) -> usize {
        self.order.len()
    }

    pub fn contains(&self, plugin_id: &str) -> bool {
        self.order.iter().any(|id| id == plugin_id)
    }
}

/// Split a topological order into layers and, per layer, into groups.
///
/// Sequential mode runs the parallel groups one plugin at a time, so both
/// modes see the same dependency results.
pub fn layout(graph: &DependencyGraph, order: &[String], mode: ExecutionMode) -> Vec<LayerPlan> {
    graph
        .group_by_layer(order)
        .into_iter()
        .map(|(layer, ids)| {
            let groups = match mode {
                ExecutionMode::Sequential => graph
                    .get_parallel_groups(&ids)
                    .into_iter()
                    .flatten()
                    .map(|id| vec![id])
                    .collect(),
                ExecutionMode::Parallel => graph.get_parallel_groups(&ids),
            };
            LayerPlan {
                layer: layer.value(),
                name: layer.name(),
                groups,
            }
        })
        .collect()
}

/// Problems visible before execution: required dependencies outside the
/// selection or scheduled in a later layer.
pub fn dependency_warnings(graph: &DependencyGraph, order: &[String]) -> Vec<String> {
    let mut warnings = Vec::new();
    for id in order {
        let layer = graph.layer_of(id);
        for dep in graph.get_dependencies(id).iter().filter(|d| d.required) {
            if !order.contains(&dep.plugin_id) {
                warnings.push(format!(
                    "'{}' requires '{}', which is not selected for this run",
                    id, dep.plugin_id
                ));
            } else if graph.layer_of(&dep.plugin_id) > layer {
                warnings.push(format!(
                    "'{}' requires '{}', which runs in a later layer",
                    id, dep.plugin_id
                ));
            }
        }
    }
    warnings
}
