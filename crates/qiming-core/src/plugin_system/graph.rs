use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::plugin_system::dependency::{DependencyError, DependencyReport, PluginDependency};
use crate::plugin_system::descriptor::Layer;

/// Represents a node in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    /// Plugin id
    pub id: String,
    /// Declared dependencies, in declaration order
    pub dependencies: Vec<PluginDependency>,
    /// Ids of nodes holding a required edge onto this node
    pub dependents: Vec<String>,
    pub layer: Layer,
}

impl DependencyNode {
    fn requires(&self, target: &str) -> bool {
        self.dependencies
            .iter()
            .any(|d| d.required && d.plugin_id == target)
    }

    fn declares(&self, target: &str) -> bool {
        self.dependencies.iter().any(|d| d.plugin_id == target)
    }
}

/// Summary counters for a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStatus {
    pub total_nodes: usize,
    /// Required edges whose target node is present
    pub total_edges: usize,
    pub has_cycles: bool,
    pub nodes_per_layer: BTreeMap<u8, usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

struct Frame<'a> {
    id: &'a str,
    targets: Vec<&'a str>,
    next: usize,
}

/// Plugin dependency graph.
///
/// A pure data structure: adding nodes never validates cycles, callers ask
/// [`has_circular_dependency`](Self::has_circular_dependency) when they need
/// to. Nodes are kept in insertion order, which is the tie-break for every
/// ordering the graph produces.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, DependencyNode>,
    order: Vec<String>,
}

impl DependencyGraph {
    /// Create a new dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a node.
    ///
    /// Every required dependency becomes an edge `dependency -> id`, and `id`
    /// is appended to that dependency's `dependents` when the dependency is
    /// present. Replacing a node keeps its insertion position.
    pub fn add_node(&mut self, id: &str, dependencies: Vec<PluginDependency>, layer: Layer) {
        if let Some(existing) = self.nodes.get(id) {
            let old_targets: Vec<String> = existing
                .dependencies
                .iter()
                .filter(|d| d.required)
                .map(|d| d.plugin_id.clone())
                .collect();
            for target in old_targets {
                if let Some(node) = self.nodes.get_mut(&target) {
                    node.dependents.retain(|d| d != id);
                }
            }
        } else {
            self.order.push(id.to_string());
        }

        // Nodes added earlier may already require this one
        let mut dependents: Vec<String> = self
            .order
            .iter()
            .filter(|other| other.as_str() != id)
            .filter(|other| self.nodes.get(*other).is_some_and(|n| n.requires(id)))
            .cloned()
            .collect();

        for dep in dependencies.iter().filter(|d| d.required) {
            if dep.plugin_id == id {
                if !dependents.iter().any(|d| d == id) {
                    dependents.push(id.to_string());
                }
            } else if let Some(target) = self.nodes.get_mut(&dep.plugin_id) {
                if !target.dependents.iter().any(|d| d == id) {
                    target.dependents.push(id.to_string());
                }
            }
        }

        self.nodes.insert(
            id.to_string(),
            DependencyNode {
                id: id.to_string(),
                dependencies,
                dependents,
                layer,
            },
        );
    }

    /// Remove a node and every reference to it. Unknown ids are a no-op.
    pub fn remove_node(&mut self, id: &str) -> Option<DependencyNode> {
        let removed = self.nodes.remove(id)?;
        self.order.retain(|n| n != id);
        for node in self.nodes.values_mut() {
            node.dependencies.retain(|d| d.plugin_id != id);
            node.dependents.retain(|d| d != id);
        }
        Some(removed)
    }

    /// Check if the graph contains a node
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&DependencyNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in insertion order
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn layer_of(&self, id: &str) -> Option<Layer> {
        self.nodes.get(id).map(|n| n.layer)
    }

    /// Declared dependencies of a node
    pub fn get_dependencies(&self, id: &str) -> Vec<PluginDependency> {
        self.nodes
            .get(id)
            .map(|n| n.dependencies.clone())
            .unwrap_or_default()
    }

    /// Nodes holding a required edge onto `id`
    pub fn get_dependents(&self, id: &str) -> Vec<String> {
        self.nodes
            .get(id)
            .map(|n| n.dependents.clone())
            .unwrap_or_default()
    }

    /// Whether either node declares a dependency (required or optional) on the other.
    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        let a_on_b = self.nodes.get(a).is_some_and(|n| n.declares(b));
        let b_on_a = self.nodes.get(b).is_some_and(|n| n.declares(a));
        a_on_b || b_on_a
    }

    /// Required-edge targets of `id` that are present and allowed.
    fn required_targets<'a>(&'a self, id: &str, allowed: Option<&HashSet<&str>>) -> Vec<&'a str> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        node.dependencies
            .iter()
            .filter(|d| d.required)
            .filter_map(|d| self.nodes.get_key_value(&d.plugin_id).map(|(k, _)| k.as_str()))
            .filter(|target| allowed.is_none_or(|set| set.contains(target)))
            .collect()
    }

    /// Iterative depth-first walk over required edges (node -> its dependencies).
    ///
    /// Appends nodes in post-order, so dependencies always precede their
    /// dependents. Returns the cycle path if a back edge is found.
    fn walk<'a>(
        &'a self,
        roots: &[&'a str],
        allowed: Option<&HashSet<&str>>,
        post_order: &mut Vec<String>,
    ) -> Result<(), Vec<String>> {
        let mut marks: HashMap<&'a str, Mark> = HashMap::new();

        for &root in roots {
            if marks.contains_key(root) {
                continue;
            }
            marks.insert(root, Mark::Visiting);
            let mut stack = vec![Frame {
                id: root,
                targets: self.required_targets(root, allowed),
                next: 0,
            }];

            while let Some(frame) = stack.last_mut() {
                if frame.next < frame.targets.len() {
                    let target = frame.targets[frame.next];
                    frame.next += 1;
                    match marks.get(target) {
                        Some(Mark::Visiting) => {
                            let start = stack.iter().position(|f| f.id == target).unwrap_or(0);
                            let mut cycle: Vec<String> =
                                stack[start..].iter().map(|f| f.id.to_string()).collect();
                            cycle.push(target.to_string());
                            return Err(cycle);
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(target, Mark::Visiting);
                            stack.push(Frame {
                                id: target,
                                targets: self.required_targets(target, allowed),
                                next: 0,
                            });
                        }
                    }
                } else {
                    let id = frame.id;
                    marks.insert(id, Mark::Done);
                    post_order.push(id.to_string());
                    stack.pop();
                }
            }
        }
        Ok(())
    }

    /// Path of the first required-edge cycle found, if any.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let roots: Vec<&str> = self.order.iter().map(String::as_str).collect();
        let mut scratch = Vec::with_capacity(roots.len());
        self.walk(&roots, None, &mut scratch).err()
    }

    /// Whether the required-edge graph contains a cycle (self-loops included).
    pub fn has_circular_dependency(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Topological order of every node.
    pub fn get_topological_order(&self) -> Result<Vec<String>, DependencyError> {
        self.topological_sort(None)
    }

    /// Topological order restricted to `enabled_ids` (when given) and to required edges.
    ///
    /// Dependencies precede dependents; unrelated nodes keep insertion order.
    /// Ids unknown to the graph are ignored. Fails closed on a cycle.
    pub fn topological_sort(&self, enabled_ids: Option<&[String]>) -> Result<Vec<String>, DependencyError> {
        let allowed: Option<HashSet<&str>> =
            enabled_ids.map(|ids| ids.iter().map(String::as_str).collect());
        let roots: Vec<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|id| allowed.as_ref().is_none_or(|set| set.contains(id)))
            .collect();

        let mut sorted = Vec::with_capacity(roots.len());
        self.walk(&roots, allowed.as_ref(), &mut sorted)
            .map_err(DependencyError::CyclicDependency)?;
        Ok(sorted)
    }

    /// Partition one layer's ids into groups safe to run concurrently.
    ///
    /// Greedy: each pass takes every remaining id that touches nothing already
    /// chosen in that pass and whose declared dependencies inside the layer
    /// were placed in earlier groups. Groups are returned in execution order.
    pub fn get_parallel_groups(&self, layer_ids: &[String]) -> Vec<Vec<String>> {
        let mut remaining: Vec<&String> = Vec::with_capacity(layer_ids.len());
        for id in layer_ids {
            if !remaining.contains(&id) {
                remaining.push(id);
            }
        }

        let mut groups = Vec::new();
        while !remaining.is_empty() {
            let mut group: Vec<String> = Vec::new();
            for id in &remaining {
                let waiting_on_dependency = self.nodes.get(id.as_str()).is_some_and(|node| {
                    node.dependencies
                        .iter()
                        .any(|d| &d.plugin_id != *id && remaining.iter().any(|r| **r == d.plugin_id))
                });
                if waiting_on_dependency {
                    continue;
                }
                if group.iter().any(|chosen| self.are_adjacent(chosen, id)) {
                    continue;
                }
                group.push((*id).clone());
            }

            // Only reachable with a cycle inside the layer
            if group.is_empty() {
                group.push(remaining[0].clone());
            }

            remaining.retain(|id| !group.contains(id));
            groups.push(group);
        }
        groups
    }

    /// Report which dependencies of `id` are present in `available_ids`.
    pub fn check_dependencies(&self, id: &str, available_ids: &HashSet<String>) -> DependencyReport {
        let mut report = DependencyReport::new(id);
        let Some(node) = self.nodes.get(id) else {
            return report;
        };
        for dep in &node.dependencies {
            if available_ids.contains(&dep.plugin_id) {
                report.satisfied.push(dep.plugin_id.clone());
            } else if dep.required {
                report.missing_required.push(dep.plugin_id.clone());
            } else {
                report.missing_optional.push(dep.plugin_id.clone());
            }
        }
        report
    }

    /// Other registered nodes holding a required edge onto `id`.
    pub fn blocking_dependents(&self, id: &str) -> Vec<String> {
        self.get_dependents(id)
            .into_iter()
            .filter(|d| d != id && self.nodes.contains_key(d))
            .collect()
    }

    /// Whether `id` may be removed without orphaning a required edge.
    pub fn can_remove(&self, id: &str) -> bool {
        self.blocking_dependents(id).is_empty()
    }

    /// Split an ordered id list into ascending layers, keeping the given order within each.
    pub fn group_by_layer(&self, ordered_ids: &[String]) -> Vec<(Layer, Vec<String>)> {
        let mut layers: BTreeMap<Layer, Vec<String>> = BTreeMap::new();
        for id in ordered_ids {
            if let Some(layer) = self.layer_of(id) {
                layers.entry(layer).or_default().push(id.clone());
            }
        }
        layers.into_iter().collect()
    }

    /// Summary counters
    pub fn status(&self) -> GraphStatus {
        let total_edges = self
            .nodes
            .values()
            .map(|n| {
                n.dependencies
                    .iter()
                    .filter(|d| d.required && self.nodes.contains_key(&d.plugin_id))
                    .count()
            })
            .sum();

        let mut nodes_per_layer = BTreeMap::new();
        for node in self.nodes.values() {
            *nodes_per_layer.entry(node.layer.value()).or_insert(0) += 1;
        }

        GraphStatus {
            total_nodes: self.nodes.len(),
            total_edges,
            has_cycles: self.has_circular_dependency(),
            nodes_per_layer,
        }
    }
}
