use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Inclusive source line range of a node in its owning file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Parse the extractor's `"start-end"` form. Anything else, including an
    /// inverted range, is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let (start, end) = text.trim().split_once('-')?;
        let start = start.trim().parse().ok()?;
        let end = end.trim().parse().ok()?;
        (start <= end).then_some(Self { start, end })
    }

    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }

    /// Distance between the start lines of two spans
    pub fn drift(&self, other: &Span) -> u32 {
        self.start.abs_diff(other.start)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Structural role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Method entry: anchor, never colored
    Entry,
    /// Method exit: anchor, never colored
    Exit,
    Statement,
}

impl NodeRole {
    pub fn from_label(label: &str) -> Self {
        if label.contains("Entry") {
            NodeRole::Entry
        } else if label.contains("Exit") {
            NodeRole::Exit
        } else {
            NodeRole::Statement
        }
    }

    pub fn is_anchor(&self) -> bool {
        matches!(self, NodeRole::Entry | NodeRole::Exit)
    }
}

/// Change polarity of a delta-PDG node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Added,
    Removed,
    #[default]
    Unchanged,
}

impl Polarity {
    /// Rendering hint derived from the polarity
    pub fn color(&self) -> &'static str {
        match self {
            Polarity::Added => "green",
            Polarity::Removed => "red",
            Polarity::Unchanged => "orange",
        }
    }

    /// Inverse of [`Polarity::color`]; unknown colors are unchanged.
    pub fn from_color(color: &str) -> Self {
        match color.trim().to_ascii_lowercase().as_str() {
            "green" => Polarity::Added,
            "red" => Polarity::Removed,
            _ => Polarity::Unchanged,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Added => "added",
            Polarity::Removed => "removed",
            Polarity::Unchanged => "unchanged",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "added" => Some(Polarity::Added),
            "removed" => Some(Polarity::Removed),
            "unchanged" => Some(Polarity::Unchanged),
            _ => None,
        }
    }

    /// Whether the node is evidence of change
    pub fn is_colored(&self) -> bool {
        !matches!(self, Polarity::Unchanged)
    }
}

/// A node of a program dependence graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdgNode {
    /// Identifier, stable within one extraction
    pub id: String,
    pub label: String,
    pub span: Option<Span>,
    pub role: NodeRole,
    pub cluster: Option<String>,
    pub polarity: Polarity,
    /// Chain step the change is attributed to
    pub provenance: Option<usize>,
    pub filepath: Option<String>,
    /// Attributes the extractor emitted that have no dedicated field
    pub extra: BTreeMap<String, String>,
}

impl PdgNode {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            span: None,
            role: NodeRole::from_label(label),
            cluster: None,
            polarity: Polarity::Unchanged,
            provenance: None,
            filepath: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_span(mut self, start: u32, end: u32) -> Self {
        self.span = Some(Span::new(start, end));
        self
    }

    pub fn with_cluster(mut self, cluster: &str) -> Self {
        self.cluster = Some(cluster.to_string());
        self
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Replace the label and re-derive the role from it
    pub fn set_label(&mut self, label: String) {
        self.role = NodeRole::from_label(&label);
        self.label = label;
    }
}

/// Kind of a dependence edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    Control,
    Data,
    NameFlow,
    Other(String),
}

impl EdgeKind {
    pub fn parse(text: &str) -> Self {
        let lower = text.trim().to_ascii_lowercase();
        if lower.contains("control") {
            EdgeKind::Control
        } else if lower.contains("data") {
            EdgeKind::Data
        } else if lower.contains("name") {
            EdgeKind::NameFlow
        } else {
            EdgeKind::Other(text.trim().to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EdgeKind::Control => "control",
            EdgeKind::Data => "data",
            EdgeKind::NameFlow => "nameflow",
            EdgeKind::Other(raw) => raw,
        }
    }
}

/// A directed dependence edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdgEdge {
    pub kind: EdgeKind,
    pub extra: BTreeMap<String, String>,
}

impl PdgEdge {
    pub fn new(kind: EdgeKind) -> Self {
        Self {
            kind,
            extra: BTreeMap::new(),
        }
    }

    pub fn control() -> Self {
        Self::new(EdgeKind::Control)
    }

    pub fn data() -> Self {
        Self::new(EdgeKind::Data)
    }
}
