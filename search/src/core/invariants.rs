//! Structural invariants for journal snapshots that JSON Schema cannot express.

use crate::core::journal::Node;

/// Check a snapshot's node list:
/// - ids are sequential insertion indices
/// - a parent is always inserted before its child
/// - parent and children links agree, and children keep insertion order
/// - buggy nodes carry no metric, and metrics are finite
pub fn validate_snapshot(nodes: &[Node]) -> Vec<String> {
    let mut errors = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        let id = node.id.index();
        if id != index {
            errors.push(format!("node at position {index} has id {id}"));
            continue;
        }

        if let Some(parent) = node.parent {
            match nodes.get(parent.index()) {
                Some(parent_node) if parent.index() < id => {
                    let links = parent_node
                        .children
                        .iter()
                        .filter(|child| **child == node.id)
                        .count();
                    if links != 1 {
                        errors.push(format!(
                            "node {id}: listed {links} times among children of parent {parent}"
                        ));
                    }
                }
                Some(_) => errors.push(format!(
                    "node {id}: parent {parent} was not inserted before its child"
                )),
                None => errors.push(format!("node {id}: unknown parent {parent}")),
            }
        }

        if !node.children.windows(2).all(|pair| pair[0] < pair[1]) {
            errors.push(format!("node {id}: children must be in insertion order"));
        }
        for child in &node.children {
            let parent_of_child = nodes.get(child.index()).and_then(|c| c.parent);
            if parent_of_child != Some(node.id) {
                errors.push(format!(
                    "node {id}: child {child} does not point back to its parent"
                ));
            }
        }

        if node.is_buggy && node.metric.is_some() {
            errors.push(format!("node {id}: buggy node must not carry a metric"));
        }
        if node.metric.is_some_and(|metric| !metric.is_finite()) {
            errors.push(format!("node {id}: metric must be finite"));
        }
    }

    errors
}
