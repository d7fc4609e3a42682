//! Delta-PDG construction
//!
//! A delta-PDG is the after-graph of a file extended with the elements the
//! change removed. Building one happens in three passes:
//!
//! 1. color both graphs against the line diff ([`mark_nodes`]): after-graph
//!    nodes touching `+` lines become `added`, before-graph nodes touching
//!    `-` lines become `removed`
//! 2. align before-graph nodes with after-graph nodes. Method entry/exit
//!    anchors are aligned first (bounded by the method fuzziness), then
//!    uncolored statements inside aligned methods (bounded by the node
//!    fuzziness)
//! 3. copy every unaligned before-graph node into the after-graph and union
//!    the edges through the alignment
//!
//! # Example
//!
//! ```ignore
//! use tangle_pdg::delta::DeltaBuilder;
//!
//! let delta = DeltaBuilder::new(100, 100).build(&before, &after, &diff);
//! for node in delta.colored_nodes() {
//!     println!("{} {}", node.polarity.as_str(), node.label);
//! }
//! ```

mod mark;

pub use mark::{changed_lines, mark_nodes};

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::config::MergeConfig;
use crate::models::DiffLine;
use crate::pdg::{Pdg, PdgNode, Polarity};

/// Id prefix given to before-graph nodes copied into a delta
const REMOVED_ID_PREFIX: &str = "before_";

/// Builds delta-PDGs with fixed alignment tolerances.
#[derive(Debug, Clone, Copy)]
pub struct DeltaBuilder {
    method_fuzziness: u32,
    node_fuzziness: u32,
}

impl From<MergeConfig> for DeltaBuilder {
    fn from(config: MergeConfig) -> Self {
        Self::new(config.method_fuzziness, config.node_fuzziness)
    }
}

impl DeltaBuilder {
    pub fn new(method_fuzziness: u32, node_fuzziness: u32) -> Self {
        Self {
            method_fuzziness,
            node_fuzziness,
        }
    }

    /// Combine `before` and `after` into one delta graph.
    ///
    /// `diff` is the line diff between the two versions of the file the
    /// graphs were extracted from.
    pub fn build(&self, before: &Pdg, after: &Pdg, diff: &[DiffLine]) -> Pdg {
        let before = mark_nodes(before, Polarity::Removed, diff);
        let after = mark_nodes(after, Polarity::Added, diff);

        let mut alignment = Alignment::default();
        self.align_methods(&before, &after, &mut alignment);
        self.align_statements(&before, &after, &mut alignment);

        let mut delta = after.clone();
        let mut copied = 0usize;
        for node in before.nodes() {
            if alignment.ids.contains_key(&node.id) {
                continue;
            }
            let mut removed = node.clone();
            removed.id = fresh_id(&delta, &node.id);
            // Anchors stay uncolored; span-less nodes carry no line evidence.
            if !removed.role.is_anchor() && removed.span.is_some() {
                removed.polarity = Polarity::Removed;
            }
            alignment.ids.insert(node.id.clone(), removed.id.clone());
            delta.add_node(removed);
            copied += 1;
        }

        for (source, target, edge) in before.edges() {
            let (Some(s), Some(t)) = (alignment.ids.get(source), alignment.ids.get(target)) else {
                continue;
            };
            delta.add_edge(s, t, edge.clone());
        }

        debug!(
            "Delta built: {} nodes ({} unified, {} copied from before), {} edges",
            delta.node_count(),
            alignment.ids.len() - copied,
            copied,
            delta.edge_count()
        );
        delta
    }

    /// Pair entry/exit nodes. With zero fuzziness signatures must be
    /// byte-identical at the same line; otherwise whitespace is ignored and
    /// the start line may drift by up to the method fuzziness.
    fn align_methods(&self, before: &Pdg, after: &Pdg, alignment: &mut Alignment) {
        let candidates: Vec<&PdgNode> = after.nodes().filter(|n| n.role.is_anchor()).collect();

        for node in before.nodes().filter(|n| n.role.is_anchor()) {
            let signature = method_signature(node);
            let matched = best_candidate(&candidates, &alignment.claimed, |cand| {
                if cand.role != node.role {
                    return None;
                }
                let cand_signature = method_signature(cand);
                let same = if self.method_fuzziness == 0 {
                    cand_signature == signature
                } else {
                    strip_whitespace(cand_signature) == strip_whitespace(signature)
                };
                if !same {
                    return None;
                }
                within(node, cand, self.method_fuzziness)
            });

            if let Some(cand) = matched {
                if let (Some(from), Some(to)) = (&node.cluster, &cand.cluster) {
                    alignment.clusters.insert(from.clone(), to.clone());
                }
                alignment.pair(node, cand);
            }
        }
    }

    /// Pair uncolored before statements with after statements of the same
    /// text in the corresponding method. Removed statements are never paired.
    fn align_statements(&self, before: &Pdg, after: &Pdg, alignment: &mut Alignment) {
        let mut by_text: HashMap<String, Vec<&PdgNode>> = HashMap::new();
        for node in after.nodes() {
            if node.role.is_anchor() || node.polarity == Polarity::Removed {
                continue;
            }
            by_text.entry(strip_whitespace(&node.label)).or_default().push(node);
        }

        for node in before.nodes() {
            if node.role.is_anchor() || node.polarity.is_colored() {
                continue;
            }
            let Some(candidates) = by_text.get(&strip_whitespace(&node.label)) else {
                continue;
            };
            let cluster = node
                .cluster
                .as_ref()
                .map(|c| alignment.clusters.get(c).unwrap_or(c));

            let matched = best_candidate(candidates, &alignment.claimed, |cand| {
                if cand.cluster.as_ref() != cluster {
                    return None;
                }
                within(node, cand, self.node_fuzziness)
            });
            if let Some(cand) = matched {
                alignment.pair(node, cand);
            }
        }
    }
}

/// Before-to-after correspondence found so far
#[derive(Debug, Default)]
struct Alignment {
    /// before id -> delta id
    ids: HashMap<String, String>,
    /// after ids already paired
    claimed: HashSet<String>,
    /// before cluster -> after cluster, from aligned anchors
    clusters: HashMap<String, String>,
}

impl Alignment {
    fn pair(&mut self, before: &PdgNode, after: &PdgNode) {
        self.ids.insert(before.id.clone(), after.id.clone());
        self.claimed.insert(after.id.clone());
    }
}

/// Build a delta graph; see [`DeltaBuilder::build`].
pub fn build_delta(
    before: &Pdg,
    after: &Pdg,
    diff: &[DiffLine],
    method_fuzziness: u32,
    node_fuzziness: u32,
) -> Pdg {
    DeltaBuilder::new(method_fuzziness, node_fuzziness).build(before, after, diff)
}

/// Unclaimed candidate with the smallest drift; earliest wins ties.
fn best_candidate<'a, F>(candidates: &[&'a PdgNode], claimed: &HashSet<String>, drift: F) -> Option<&'a PdgNode>
where
    F: Fn(&PdgNode) -> Option<u32>,
{
    let mut best: Option<(u32, &'a PdgNode)> = None;
    for &cand in candidates {
        if claimed.contains(&cand.id) {
            continue;
        }
        let Some(d) = drift(cand) else {
            continue;
        };
        if best.map_or(true, |(best_d, _)| d < best_d) {
            best = Some((d, cand));
        }
    }
    best.map(|(_, node)| node)
}

/// Start-line drift between two nodes if it is within `fuzziness`.
/// Nodes without spans only match each other, at zero drift.
fn within(a: &PdgNode, b: &PdgNode, fuzziness: u32) -> Option<u32> {
    match (a.span, b.span) {
        (Some(sa), Some(sb)) => {
            let drift = sa.drift(&sb);
            (drift <= fuzziness).then_some(drift)
        }
        (None, None) => Some(0),
        _ => None,
    }
}

/// Label of an entry/exit node without the cluster suffix added by marking
fn method_signature(node: &PdgNode) -> &str {
    match &node.cluster {
        Some(cluster) => node
            .label
            .strip_suffix(cluster.as_str())
            .and_then(|rest| rest.strip_suffix(' '))
            .unwrap_or(&node.label),
        None => &node.label,
    }
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// An id for a copied before node that does not collide with the delta
fn fresh_id(delta: &Pdg, id: &str) -> String {
    let mut candidate = format!("{}{}", REMOVED_ID_PREFIX, id);
    let mut n = 1;
    while delta.contains(&candidate) {
        candidate = format!("{}{}_{}", REMOVED_ID_PREFIX, id, n);
        n += 1;
    }
    candidate
}
