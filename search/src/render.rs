//! Human-readable renderings of the solution tree.
//!
//! Both renderers consume [`Journal::traverse`] and [`Journal::best_node`], so
//! they always list nodes in the same order and agree on which node is best.

use colored::Colorize;

use crate::core::journal::{Journal, Node, NodeId};

const TITLE: &str = "Solution tree";

/// How a node is labelled in either rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeMark {
    Buggy,
    Best(f64),
    Scored(f64),
    Unscored,
}

fn mark(node: &Node, best: Option<NodeId>) -> NodeMark {
    if node.is_buggy {
        return NodeMark::Buggy;
    }
    match node.metric {
        Some(metric) if best == Some(node.id) => NodeMark::Best(metric),
        Some(metric) => NodeMark::Scored(metric),
        None => NodeMark::Unscored,
    }
}

/// Flat indented text, two spaces per level. Used for logs and `tree.txt`.
pub fn journal_to_string_tree(journal: &Journal) -> String {
    let best = journal.best_node();
    let mut out = format!("{TITLE}\n");
    for (depth, node) in journal.traverse() {
        let indent = "  ".repeat(depth);
        let id = node.id;
        let line = match mark(node, best) {
            NodeMark::Buggy => format!("{indent}◍ bug (ID: {id})"),
            NodeMark::Best(metric) => format!("{indent}● {metric:.3} (best) (ID: {id})"),
            NodeMark::Scored(metric) => format!("{indent}● {metric:.3} (ID: {id})"),
            NodeMark::Unscored => format!("{indent}● n/a (ID: {id})"),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Colored hierarchical view with tree guides, for terminals.
pub fn journal_to_styled_tree(journal: &Journal) -> String {
    let best = journal.best_node();
    let entries: Vec<(usize, &Node)> = journal.traverse().collect();
    let mut out = format!("{}\n", TITLE.bold().blue());
    // open[d]: the ancestor at depth d still has siblings below it.
    let mut open: Vec<bool> = Vec::new();

    for (index, (depth, node)) in entries.iter().enumerate() {
        let last = is_last_sibling(&entries, index);
        open.truncate(*depth);
        for &more in &open {
            out.push_str(if more { "│   " } else { "    " });
        }
        out.push_str(if last { "└── " } else { "├── " });

        let label = match mark(node, best) {
            NodeMark::Buggy => "◍ bug".red().to_string(),
            NodeMark::Best(metric) => format!("● {metric:.3} (best)").green().bold().to_string(),
            NodeMark::Scored(metric) => format!("● {metric:.3}").green().to_string(),
            NodeMark::Unscored => "● n/a".dimmed().to_string(),
        };
        out.push_str(&label);
        out.push('\n');
        open.push(!last);
    }
    out
}

/// In a pre-order listing, a node is the last of its siblings when the next
/// entry at the same or a shallower depth is shallower (or does not exist).
fn is_last_sibling(entries: &[(usize, &Node)], index: usize) -> bool {
    let depth = entries[index].0;
    entries[index + 1..]
        .iter()
        .map(|(d, _)| *d)
        .find(|d| *d <= depth)
        .is_none_or(|d| d < depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Journal {
        let mut journal = Journal::new();
        let a = journal.insert(None, false, Some(0.2));
        let b = journal.insert(Some(a), false, Some(0.4));
        journal.insert(Some(a), true, None);
        journal.insert(Some(b), false, None);
        journal.insert(None, false, Some(0.1));
        journal
    }

    #[test]
    fn string_tree_marks_best_buggy_and_unscored() {
        let rendered = journal_to_string_tree(&sample());
        let expected = "\
Solution tree
● 0.200 (ID: 0)
  ● 0.400 (best) (ID: 1)
    ● n/a (ID: 3)
  ◍ bug (ID: 2)
● 0.100 (ID: 4)
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn string_tree_of_empty_journal_is_title_only() {
        assert_eq!(journal_to_string_tree(&Journal::new()), "Solution tree\n");
    }

    #[test]
    fn styled_tree_draws_guides_in_traversal_order() {
        colored::control::set_override(false);
        let rendered = journal_to_styled_tree(&sample());
        let expected = "\
Solution tree
├── ● 0.200
│   ├── ● 0.400 (best)
│   │   └── ● n/a
│   └── ◍ bug
└── ● 0.100
";
        assert_eq!(rendered, expected);
    }
}
