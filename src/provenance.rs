//! Provenance attribution
//!
//! Every changed node of a delta-PDG is labelled with the chain step that
//! introduced it. Attribution runs in two passes:
//!
//! - [`mark_origin`] tags each changed line of the cumulative diff (anchor
//!   parent to final tip) with the last step whose atomic diff carries the
//!   same line
//! - [`attribute`] matches colored nodes against those tagged lines by
//!   text and span, keeping the highest step
//!
//! The cumulative diff supplies line numbers in the coordinates of the
//! before/after snapshots the graphs were extracted from; the atomic diffs
//! only decide which step a line belongs to. When nothing matches the label
//! is 0, the same value as the anchor commit itself.

use tracing::trace;

use crate::models::{ChangeKind, DiffLine};
use crate::pdg::{Pdg, Polarity};

/// A changed line of the cumulative diff tagged with its originating step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedLine {
    pub line: DiffLine,
    pub step: usize,
}

/// Tag every changed line of `cumulative` with the highest index `i` such
/// that `atomic[i]` has a line of the same kind and file whose trimmed text
/// is equal. Context lines are dropped. Lines found in no step get 0.
pub fn mark_origin(cumulative: &[DiffLine], atomic: &[Vec<DiffLine>]) -> Vec<MarkedLine> {
    cumulative
        .iter()
        .filter(|line| line.kind.is_change())
        .map(|line| {
            let text = line.text.trim();
            let step = atomic
                .iter()
                .enumerate()
                .rev()
                .find(|(_, diff)| {
                    diff.iter()
                        .any(|l| l.kind == line.kind && l.file == line.file && l.text.trim() == text)
                })
                .map_or(0, |(i, _)| i);
            MarkedLine {
                line: line.clone(),
                step,
            }
        })
        .collect()
}

/// Reduce a node label to the text a source line would carry.
///
/// Entry/exit labels become the bare method name, anonymous functions
/// collapse to `=>`, doubled single quotes become a double quote, and
/// anything after the first escaped carriage return or newline is dropped.
pub fn normalize_label(label: &str) -> String {
    let mut label = label.replace("''", "\"");

    for boundary in ["Entry", "Exit"] {
        if label.contains(boundary) {
            let rest = label.get(boundary.len() + 1..).unwrap_or("");
            let qualified = rest.split('(').next().unwrap_or("");
            label = qualified.rsplit('.').next().unwrap_or("").to_string();
            break;
        }
    }

    if label.contains("lambda") {
        return "=>".to_string();
    }

    if let Some((head, _)) = label.split_once("\\r") {
        label = head.to_string();
    } else if let Some((head, _)) = label.split_once("\\n") {
        label = head.to_string();
    }
    label
}

/// Set the provenance of every colored node of `delta` from `marked`.
///
/// A node matches a line when the line has the node's change kind, belongs
/// to `file`, its trimmed text equals the node's normalized label, and its
/// line number on the node's side of the diff lies inside the node's span.
/// The highest matching step wins; no match yields 0.
pub fn attribute(delta: &mut Pdg, marked: &[MarkedLine], file: &str) {
    for node in delta.nodes_mut() {
        let kind = match node.polarity {
            Polarity::Added => ChangeKind::Added,
            Polarity::Removed => ChangeKind::Removed,
            Polarity::Unchanged => continue,
        };
        let label = normalize_label(&node.label);
        let label = label.trim();
        let span = node.span;

        let step = marked
            .iter()
            .filter(|m| m.line.kind == kind && m.line.file == file)
            .filter(|m| m.line.text.trim() == label)
            .filter(|m| {
                span.zip(m.line.changed_line())
                    .is_some_and(|(span, ln)| span.contains(ln))
            })
            .map(|m| m.step)
            .max()
            .unwrap_or(0);

        trace!("{} {:?} -> step {}", node.id, node.label, step);
        node.provenance = Some(step);
    }
}

/// Run both passes for one file of a chain.
///
/// `atomic[0]` is the anchor's own diff and `atomic[i]` the diff introduced
/// by the i-th replayed commit.
pub fn label_provenance(delta: &mut Pdg, cumulative: &[DiffLine], atomic: &[Vec<DiffLine>], file: &str) {
    let marked = mark_origin(cumulative, atomic);
    attribute(delta, &marked, file);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdg::PdgNode;

    const FILE: &str = "src/A.java";

    #[test]
    fn test_normalize_entry_exit() {
        assert_eq!(normalize_label("Entry com.acme.Foo.bar(int) Foo.bar"), "bar");
        assert_eq!(normalize_label("Exit Foo.baz()"), "baz");
    }

    #[test]
    fn test_normalize_lambda_and_escapes() {
        assert_eq!(normalize_label("lambda$0 x -> x + 1"), "=>");
        assert_eq!(normalize_label("if (a) {\\n  b();"), "if (a) {");
        assert_eq!(normalize_label("s = \\r\\n"), "s = ");
        assert_eq!(normalize_label("say(''hi'');"), "say(\"hi\");");
        assert_eq!(normalize_label("  x = 1;  "), "  x = 1;  ");
    }

    #[test]
    fn test_mark_origin_last_writer_wins() {
        let cumulative = vec![
            DiffLine::added(FILE, 5, "    x = 2;"),
            DiffLine::context(FILE, 6, 6, "    y();"),
        ];
        let atomic = vec![
            vec![DiffLine::added(FILE, 1, "int x;")],
            vec![DiffLine::added(FILE, 4, "x = 2;")],
            vec![DiffLine::removed(FILE, 4, "x = 2;")],
            vec![DiffLine::added(FILE, 5, "  x = 2;  ")],
            vec![DiffLine::added("src/B.java", 5, "x = 2;")],
        ];

        let marked = mark_origin(&cumulative, &atomic);
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].step, 3);
    }

    #[test]
    fn test_mark_origin_defaults_to_zero() {
        let cumulative = vec![DiffLine::removed(FILE, 2, "old();")];
        let marked = mark_origin(&cumulative, &[vec![], vec![DiffLine::added(FILE, 2, "old();")]]);
        assert_eq!(marked[0].step, 0);
    }

    #[test]
    fn test_attribute_picks_highest_step_in_span() {
        let mut delta = Pdg::new();
        delta.add_node(PdgNode::new("7", "x = 2;").with_span(5, 5).with_polarity(Polarity::Added));

        let cumulative = vec![DiffLine::added(FILE, 5, "x = 2;")];
        let atomic = vec![
            vec![],
            vec![DiffLine::added(FILE, 5, "x = 2;")],
            vec![],
            vec![DiffLine::added(FILE, 9, "x = 2;")],
        ];
        label_provenance(&mut delta, &cumulative, &atomic, FILE);

        assert_eq!(delta.node("7").unwrap().provenance, Some(3));
    }

    #[test]
    fn test_attribute_requires_span_and_sign() {
        let mut delta = Pdg::new();
        delta.add_node(PdgNode::new("a", "f();").with_span(10, 12).with_polarity(Polarity::Added));
        delta.add_node(PdgNode::new("r", "f();").with_span(3, 3).with_polarity(Polarity::Removed));
        delta.add_node(PdgNode::new("u", "f();").with_span(10, 10));

        let marked = vec![
            MarkedLine {
                line: DiffLine::added(FILE, 20, "f();"),
                step: 2,
            },
            MarkedLine {
                line: DiffLine::removed(FILE, 3, "f();"),
                step: 1,
            },
        ];
        attribute(&mut delta, &marked, FILE);

        assert_eq!(delta.node("a").unwrap().provenance, Some(0));
        assert_eq!(delta.node("r").unwrap().provenance, Some(1));
        assert_eq!(delta.node("u").unwrap().provenance, None);
    }

    #[test]
    fn test_attribute_ignores_other_files() {
        let mut delta = Pdg::new();
        delta.add_node(PdgNode::new("a", "f();").with_span(1, 1).with_polarity(Polarity::Added));
        let marked = vec![MarkedLine {
            line: DiffLine::added("src/B.java", 1, "f();"),
            step: 4,
        }];
        attribute(&mut delta, &marked, FILE);
        assert_eq!(delta.node("a").unwrap().provenance, Some(0));
    }

    #[test]
    fn test_attribution_is_deterministic() {
        let build = || {
            let mut delta = Pdg::new();
            for i in 0..20u32 {
                delta.add_node(
                    PdgNode::new(&i.to_string(), &format!("s{};", i % 3))
                        .with_span(i, i + 1)
                        .with_polarity(Polarity::Added),
                );
            }
            delta
        };
        let cumulative: Vec<DiffLine> = (0..20u32).map(|i| DiffLine::added(FILE, i, &format!("s{};", i % 3))).collect();
        let atomic: Vec<Vec<DiffLine>> = (0..4).map(|k| cumulative.iter().skip(k).step_by(2).cloned().collect()).collect();

        let mut first = build();
        let mut second = build();
        label_provenance(&mut first, &cumulative, &atomic, FILE);
        label_provenance(&mut second, &cumulative, &atomic, FILE);

        let labels = |g: &Pdg| g.nodes().map(|n| n.provenance).collect::<Vec<_>>();
        assert_eq!(labels(&first), labels(&second));
        assert!(first.nodes().all(|n| n.provenance.is_some_and(|p| p < atomic.len())));
    }
}
