//! The resolver graph: builds the DAG of resolvers, groups, routers,
//! and listeners from a declarative node list, detecting cycles,
//! duplicate IDs, and missing references before any query is served.
//!
//! Generalized from the teacher's `Upstreams::traverse`/`validate`
//! cycle-detection walk (`droute/src/router/upstreams/mod.rs`), which
//! only ever covered a flat "hybrid tag" fan-out; here it walks the
//! full resolvers/groups/routers/listeners dependency graph described
//! by the specification.

use crate::Label;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Graph construction failure.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Two nodes were declared under the same label.
    #[error("duplicate node id `{0}`")]
    DuplicateId(Label),

    /// A node's dependency list names a label not present anywhere in
    /// the graph.
    #[error("node `{0}` references unknown node `{1}`")]
    MissingReference(Label, Label),

    /// Following dependency edges from `0` eventually reaches `0`
    /// again, with the cycle's path (in traversal order) as the
    /// second field.
    #[error("cycle detected starting at `{0}`: {1}")]
    Cycle(Label, String),

    /// A listener referenced a router/group/resolver that exists, but
    /// building it (instantiating the runtime value from its spec)
    /// failed.
    #[error("failed to build node `{0}`: {1}")]
    BuildFailed(Label, String),

    /// No listeners were configured; the graph would never serve a query.
    #[error("no listeners configured")]
    NoListeners,
}

/// Anything that can sit in the graph: it knows which other labels it
/// depends on, independent of what kind of node it ultimately builds
/// into. Implemented by a spec type in `config` for every node kind
/// (transport client, cache, blocklist, modifier, group, router,
/// static responder).
pub trait GraphNode {
    /// Labels this node's outbound edges point to. Transport clients
    /// and static responders return an empty list (they are graph
    /// leaves); groups, routers, and wrapping nodes (cache, blocklist,
    /// modifiers) return every resolver they dispatch to.
    fn dependencies(&self) -> Vec<Label>;
}

/// Topologically sorts `nodes` (a label -> node map) and returns the
/// build order (dependencies before dependents), or a [`GraphError`]
/// if the graph is malformed. `roots` are the labels every node must
/// be reachable from (typically the configured listeners); any node
/// not reachable from a root is still included in the returned order
/// (it is simply unused, not an error — `spec.md` does not mandate
/// full reachability, only acyclicity and resolvability).
pub fn topological_order<T: GraphNode>(nodes: &HashMap<Label, T>) -> Result<Vec<Label>, GraphError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks: HashMap<Label, Mark> = nodes.keys().map(|k| (k.clone(), Mark::Unvisited)).collect();
    let mut order = Vec::with_capacity(nodes.len());
    let mut path = Vec::new();

    fn visit<T: GraphNode>(
        label: &Label,
        nodes: &HashMap<Label, T>,
        marks: &mut HashMap<Label, Mark>,
        path: &mut Vec<Label>,
        order: &mut Vec<Label>,
    ) -> Result<(), GraphError> {
        match marks.get(label) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                path.push(label.clone());
                let start = path.iter().position(|l| l == label).unwrap();
                let cycle_path = path[start..].join(" -> ");
                return Err(GraphError::Cycle(label.clone(), cycle_path));
            }
            Some(Mark::Unvisited) => {}
            None => return Err(GraphError::MissingReference(label.clone(), label.clone())),
        }

        marks.insert(label.clone(), Mark::InProgress);
        path.push(label.clone());

        let node = nodes.get(label).expect("presence checked above");
        for dep in node.dependencies() {
            if !nodes.contains_key(&dep) {
                return Err(GraphError::MissingReference(label.clone(), dep));
            }
            visit(&dep, nodes, marks, path, order)?;
        }

        path.pop();
        marks.insert(label.clone(), Mark::Done);
        order.push(label.clone());
        Ok(())
    }

    let mut labels: Vec<Label> = nodes.keys().cloned().collect();
    labels.sort();
    for label in &labels {
        if marks.get(label) == Some(&Mark::Unvisited) {
            visit(label, nodes, &mut marks, &mut path, &mut order)?;
        }
    }

    Ok(order)
}

/// Ensures every label in `node_ids` is unique, returning the first
/// duplicate encountered.
pub fn check_duplicates<'a>(node_ids: impl Iterator<Item = &'a Label>) -> Result<(), GraphError> {
    let mut seen = HashSet::new();
    for id in node_ids {
        if !seen.insert(id) {
            return Err(GraphError::DuplicateId(id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node(Vec<Label>);
    impl GraphNode for Node {
        fn dependencies(&self) -> Vec<Label> {
            self.0.clone()
        }
    }

    fn label(s: &str) -> Label {
        Label::from(s)
    }

    #[test]
    fn acyclic_graph_sorts_dependencies_first() {
        let mut nodes = HashMap::new();
        nodes.insert(label("router"), Node(vec![label("group")]));
        nodes.insert(label("group"), Node(vec![label("a"), label("b")]));
        nodes.insert(label("a"), Node(vec![]));
        nodes.insert(label("b"), Node(vec![]));

        let order = topological_order(&nodes).unwrap();
        let pos = |l: &str| order.iter().position(|x| x.as_ref() == l).unwrap();
        assert!(pos("a") < pos("group"));
        assert!(pos("b") < pos("group"));
        assert!(pos("group") < pos("router"));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut nodes = HashMap::new();
        nodes.insert(label("a"), Node(vec![label("a")]));
        assert!(matches!(topological_order(&nodes), Err(GraphError::Cycle(_, _))));
    }

    #[test]
    fn mutual_reference_is_a_cycle() {
        let mut nodes = HashMap::new();
        nodes.insert(label("a"), Node(vec![label("b")]));
        nodes.insert(label("b"), Node(vec![label("a")]));
        assert!(matches!(topological_order(&nodes), Err(GraphError::Cycle(_, _))));
    }

    #[test]
    fn missing_reference_is_rejected() {
        let mut nodes = HashMap::new();
        nodes.insert(label("a"), Node(vec![label("ghost")]));
        assert!(matches!(
            topological_order(&nodes),
            Err(GraphError::MissingReference(_, _))
        ));
    }

    #[test]
    fn duplicate_detection_reports_first_repeat() {
        let ids = vec![label("a"), label("b"), label("a")];
        assert!(matches!(check_duplicates(ids.iter()), Err(GraphError::DuplicateId(_))));
    }
}
