//! The sensitivity-list tracker (§4.2): derives the set of variables a
//! process must be woken on from the span of [`Graph`] nodes that make
//! up its body.

use std::collections::BTreeSet;

use crate::graph::{Graph, NodeKind};
use petgraph::graph::NodeIndex;

/// Incremental sensitivity-list state. `nodes` accumulates upstream
/// variables seen so far; `provides` accumulates variables already
/// driven by an earlier node in the same stream, which later masks
/// them out of the final list (a process never needs to watch a
/// variable it drives itself).
#[derive(Debug, Default)]
pub struct SensitivityBuilder {
    nodes: BTreeSet<String>,
    provides: BTreeSet<String>,
}

impl SensitivityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one graph node (a continuous assign, a net initializer, or
    /// a procedural block) into the running state: its variable
    /// predecessors join `nodes`, its variable successors join
    /// `provides`.
    pub fn add_node(&mut self, graph: &Graph, idx: NodeIndex) {
        for pred in graph.predecessors(idx) {
            if let NodeKind::Variable(name) = graph.kind(pred) {
                self.nodes.insert(name.clone());
            }
        }
        for succ in graph.successors(idx) {
            if let NodeKind::Variable(name) = graph.kind(succ) {
                self.provides.insert(name.clone());
            }
        }
    }

    /// The final sensitivity list: every accumulated upstream variable
    /// not also self-provided, already lexicographically sorted by
    /// virtue of the underlying `BTreeSet`.
    pub fn finish(self) -> Vec<String> {
        self.nodes.difference(&self.provides).cloned().collect()
    }
}

/// Convenience wrapper for the common case: derive the sensitivity list
/// for one contiguous span of nodes in a single call.
pub fn sensitivity_list(graph: &Graph, node_indices: impl IntoIterator<Item = NodeIndex>) -> Vec<String> {
    let mut builder = SensitivityBuilder::new();
    for idx in node_indices {
        builder.add_node(graph, idx);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_provided_variable_is_excluded() {
        let mut g = Graph::new();
        let a = g.variable("a");
        let blk = g.new_block();
        let b = g.variable("b");
        g.add_edge(a, blk);
        g.add_edge(blk, b);
        g.add_edge(b, blk);

        let list = sensitivity_list(&g, [blk]);
        assert_eq!(list, vec!["a".to_string()]);
    }

    #[test]
    fn list_is_sorted_lexicographically() {
        let mut g = Graph::new();
        let z = g.variable("z");
        let a = g.variable("a");
        let blk = g.new_block();
        let out = g.variable("out");
        g.add_edge(z, blk);
        g.add_edge(a, blk);
        g.add_edge(blk, out);

        let list = sensitivity_list(&g, [blk]);
        assert_eq!(list, vec!["a".to_string(), "z".to_string()]);
    }
}
