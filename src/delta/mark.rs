//! Node coloring against a line-level diff

use std::collections::BTreeSet;

use crate::models::{ChangeKind, DiffLine};
use crate::pdg::{Pdg, Polarity};

/// Changed line numbers on the side of the diff `polarity` refers to:
/// after-lines of additions or before-lines of removals.
pub fn changed_lines(polarity: Polarity, diff: &[DiffLine]) -> BTreeSet<u32> {
    let kind = match polarity {
        Polarity::Added => ChangeKind::Added,
        Polarity::Removed => ChangeKind::Removed,
        Polarity::Unchanged => return BTreeSet::new(),
    };
    diff.iter()
        .filter(|l| l.kind == kind)
        .filter_map(|l| l.changed_line())
        .collect()
}

/// Color every node whose span contains a changed line of `polarity`.
///
/// Entry/exit nodes get their cluster appended to the label and are never
/// colored. Nodes without a parseable or ordered span stay uncolored.
pub fn mark_nodes(pdg: &Pdg, polarity: Polarity, diff: &[DiffLine]) -> Pdg {
    let lines = changed_lines(polarity, diff);
    let mut marked = pdg.clone();

    for node in marked.nodes_mut() {
        if node.role.is_anchor() {
            if let Some(cluster) = &node.cluster {
                node.label = format!("{} {}", node.label, cluster);
            }
            continue;
        }
        let Some(span) = node.span.filter(|s| s.is_ordered()) else {
            continue;
        };
        if lines.range(span.start..=span.end).next().is_some() {
            node.polarity = polarity;
        }
    }

    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdg::{NodeRole, PdgNode};

    fn sample() -> Pdg {
        let mut pdg = Pdg::new();
        pdg.add_node(PdgNode::new("1", "Entry A.f()").with_span(1, 10).with_cluster("A.f"));
        pdg.add_node(PdgNode::new("2", "x = 1;").with_span(2, 2).with_cluster("A.f"));
        pdg.add_node(PdgNode::new("3", "if (x) {").with_span(3, 6).with_cluster("A.f"));
        pdg.add_node(PdgNode::new("4", "y();").with_cluster("A.f"));
        pdg
    }

    #[test]
    fn test_added_lines_color_overlapping_spans() {
        let diff = vec![DiffLine::added("A.java", 5, "  z();")];
        let marked = mark_nodes(&sample(), Polarity::Added, &diff);
        assert_eq!(marked.node("3").unwrap().polarity, Polarity::Added);
        assert_eq!(marked.node("2").unwrap().polarity, Polarity::Unchanged);
    }

    #[test]
    fn test_removed_polarity_uses_before_lines() {
        let diff = vec![
            DiffLine::removed("A.java", 2, "x = 1;"),
            DiffLine::added("A.java", 3, "x = 2;"),
        ];
        let marked = mark_nodes(&sample(), Polarity::Removed, &diff);
        assert_eq!(marked.node("2").unwrap().polarity, Polarity::Removed);
        assert_eq!(marked.node("3").unwrap().polarity, Polarity::Unchanged);
    }

    #[test]
    fn test_entry_nodes_are_relabelled_not_colored() {
        let diff = vec![DiffLine::added("A.java", 1, "void f() {")];
        let marked = mark_nodes(&sample(), Polarity::Added, &diff);
        let entry = marked.node("1").unwrap();
        assert_eq!(entry.role, NodeRole::Entry);
        assert_eq!(entry.label, "Entry A.f() A.f");
        assert_eq!(entry.polarity, Polarity::Unchanged);
    }

    #[test]
    fn test_nodes_without_span_stay_uncolored() {
        let diff: Vec<DiffLine> = (1..20).map(|n| DiffLine::added("A.java", n, "")).collect();
        let marked = mark_nodes(&sample(), Polarity::Added, &diff);
        assert_eq!(marked.node("4").unwrap().polarity, Polarity::Unchanged);
    }

    #[test]
    fn test_context_lines_never_color() {
        let diff = vec![DiffLine::context("A.java", 2, 2, "x = 1;")];
        let marked = mark_nodes(&sample(), Polarity::Added, &diff);
        assert_eq!(marked.colored_nodes().count(), 0);
    }

    #[test]
    fn test_inverted_span_stays_uncolored() {
        let mut pdg = Pdg::new();
        pdg.add_node(PdgNode::new("1", "x = 1;").with_span(9, 3));
        let diff: Vec<DiffLine> = (1..12).map(|n| DiffLine::added("A.java", n, "x = 1;")).collect();
        let marked = mark_nodes(&pdg, Polarity::Added, &diff);
        assert_eq!(marked.node("1").unwrap().polarity, Polarity::Unchanged);
    }

    #[test]
    fn test_inverted_span_from_dot_does_not_abort_merge() {
        let after = crate::pdg::dot::parse_dot("digraph { 1 [label=\"x = 1;\", span=\"9-3\"]; }").unwrap();
        let diff = vec![DiffLine::added("A.java", 5, "x = 1;")];
        let delta = crate::delta::build_delta(&Pdg::new(), &after, &diff, 100, 100);
        let node = delta.node("1").unwrap();
        assert_eq!(node.span, None);
        assert_eq!(node.polarity, Polarity::Unchanged);
    }

    #[test]
    fn test_span_starting_at_zero() {
        let mut pdg = Pdg::new();
        pdg.add_node(PdgNode::new("z", "x = 1;").with_span(0, 0));
        pdg.add_node(PdgNode::new("w", "y = 2;").with_span(0, 2));
        let diff = vec![DiffLine::added("A.java", 2, "y = 2;")];
        let marked = mark_nodes(&pdg, Polarity::Added, &diff);
        assert_eq!(marked.node("z").unwrap().polarity, Polarity::Unchanged);
        assert_eq!(marked.node("w").unwrap().polarity, Polarity::Added);
    }
}
