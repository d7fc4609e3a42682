//! DOT graph-description files
//!
//! Reads the subset of DOT the PDG extractor writes and writes delta-PDGs
//! back out. Supported on input:
//!
//! - `digraph`/`graph` headers with optional `strict` and name
//! - `subgraph` blocks (nested); a node first declared inside a subgraph
//!   belongs to that cluster unless it carries its own `cluster` attribute
//! - node statements `id [k=v, ...]` and edge chains `a -> b -> c [k=v]`
//! - quoted strings, `//`, `/* */` and `#` comments
//!
//! Escapes inside quoted strings are kept verbatim except `\"`, so a label's
//! literal `\n` markers survive a read/write cycle unchanged.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use super::{EdgeKind, Pdg, PdgEdge, PdgNode, Polarity, Span};

/// Graph written by the extractor wrapper when a file does not exist
pub const EMPTY_GRAPH: &str = "digraph \"extractedGraph\" {\n}\n";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Id(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Equals,
    Semi,
    Comma,
    Arrow,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' | '}' | '[' | ']' | '=' | ';' | ',' => {
                chars.next();
                tokens.push(match c {
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '=' => Token::Equals,
                    ';' => Token::Semi,
                    _ => Token::Comma,
                });
            }
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' => {
                chars.next();
                match chars.next() {
                    Some('/') => {
                        for c in chars.by_ref() {
                            if c == '\n' {
                                break;
                            }
                        }
                    }
                    Some('*') => {
                        let mut prev = '\0';
                        let mut closed = false;
                        for c in chars.by_ref() {
                            if prev == '*' && c == '/' {
                                closed = true;
                                break;
                            }
                            prev = c;
                        }
                        if !closed {
                            bail!("unterminated block comment");
                        }
                    }
                    _ => bail!("unexpected '/'"),
                }
            }
            '-' => {
                chars.next();
                match chars.peek() {
                    Some('>') | Some('-') => {
                        chars.next();
                        tokens.push(Token::Arrow);
                    }
                    _ => {
                        // Negative numeral
                        let mut id = String::from("-");
                        while let Some(&c) = chars.peek() {
                            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                                id.push(c);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        tokens.push(Token::Id(id));
                    }
                }
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some('"') => value.push('"'),
                            Some(next) => {
                                value.push('\\');
                                value.push(next);
                            }
                            None => value.push('\\'),
                        },
                        _ => value.push(c),
                    }
                }
                if !closed {
                    bail!("unterminated string");
                }
                tokens.push(Token::Id(value));
            }
            _ => {
                let mut id = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' || c == ':' {
                        id.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if id.is_empty() {
                    bail!("unexpected character {:?}", c);
                }
                tokens.push(Token::Id(id));
            }
        }
    }

    Ok(tokens)
}

/// A subgraph being parsed: its name, `label` attribute and the nodes first
/// declared inside it.
struct Scope {
    name: Option<String>,
    label: Option<String>,
    members: Vec<String>,
}

impl Scope {
    fn cluster_name(&self) -> Option<String> {
        self.label.clone().or_else(|| self.name.clone())
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pdg: Pdg,
    /// Nodes that received an explicit `cluster` attribute
    explicit_cluster: std::collections::HashSet<String>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            other => bail!("expected {:?}, found {:?}", expected, other),
        }
    }

    fn id(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Id(id)) => Ok(id),
            other => bail!("expected identifier, found {:?}", other),
        }
    }

    fn graph(&mut self) -> Result<()> {
        let mut keyword = self.id()?;
        if keyword.eq_ignore_ascii_case("strict") {
            keyword = self.id()?;
        }
        if !keyword.eq_ignore_ascii_case("digraph") && !keyword.eq_ignore_ascii_case("graph") {
            bail!("expected digraph, found {}", keyword);
        }
        if let Some(Token::Id(_)) = self.peek() {
            self.next();
        }
        self.expect(Token::LBrace)?;
        let mut root = Scope {
            name: None,
            label: None,
            members: Vec::new(),
        };
        self.statements(&mut root)?;
        Ok(())
    }

    /// Parse statements up to and including the closing brace.
    fn statements(&mut self, scope: &mut Scope) -> Result<()> {
        loop {
            match self.peek() {
                None => bail!("unexpected end of graph"),
                Some(Token::RBrace) => {
                    self.next();
                    return Ok(());
                }
                Some(Token::Semi) => {
                    self.next();
                }
                Some(Token::LBrace) => {
                    self.next();
                    self.subgraph(None, scope)?;
                }
                Some(Token::Id(id)) if id.eq_ignore_ascii_case("subgraph") => {
                    self.next();
                    let name = match self.peek() {
                        Some(Token::Id(_)) => Some(self.id()?),
                        _ => None,
                    };
                    self.expect(Token::LBrace)?;
                    self.subgraph(name, scope)?;
                }
                Some(Token::Id(_)) => self.statement(scope)?,
                Some(other) => bail!("unexpected token {:?}", other),
            }
        }
    }

    fn subgraph(&mut self, name: Option<String>, parent: &mut Scope) -> Result<()> {
        let mut scope = Scope {
            name,
            label: None,
            members: Vec::new(),
        };
        self.statements(&mut scope)?;
        if let Some(cluster) = scope.cluster_name() {
            for id in &scope.members {
                if self.explicit_cluster.contains(id) {
                    continue;
                }
                if let Some(node) = self.pdg.node_mut(id) {
                    if node.cluster.is_none() {
                        node.cluster = Some(cluster.clone());
                    }
                }
            }
        }
        parent.members.extend(scope.members);
        Ok(())
    }

    fn statement(&mut self, scope: &mut Scope) -> Result<()> {
        let first = self.id()?;

        match self.peek() {
            Some(Token::Equals) => {
                self.next();
                let value = self.id()?;
                if first == "label" {
                    scope.label = Some(value);
                }
                return Ok(());
            }
            Some(Token::LBracket)
                if matches!(first.to_ascii_lowercase().as_str(), "node" | "edge" | "graph") =>
            {
                self.attributes()?;
                return Ok(());
            }
            _ => {}
        }

        let mut chain = vec![first];
        while let Some(Token::Arrow) = self.peek() {
            self.next();
            chain.push(self.id()?);
        }
        let attrs = match self.peek() {
            Some(Token::LBracket) => self.attributes()?,
            _ => BTreeMap::new(),
        };

        if chain.len() == 1 {
            self.declare_node(&chain[0], attrs, scope);
        } else {
            for id in &chain {
                self.touch_node(id, scope);
            }
            let edge = edge_from_attrs(attrs);
            for pair in chain.windows(2) {
                self.pdg.add_edge(&pair[0], &pair[1], edge.clone());
            }
        }
        Ok(())
    }

    fn attributes(&mut self) -> Result<BTreeMap<String, String>> {
        self.expect(Token::LBracket)?;
        let mut attrs = BTreeMap::new();
        loop {
            match self.next() {
                Some(Token::RBracket) => return Ok(attrs),
                Some(Token::Comma) | Some(Token::Semi) => {}
                Some(Token::Id(key)) => {
                    let value = match self.peek() {
                        Some(Token::Equals) => {
                            self.next();
                            self.id()?
                        }
                        _ => "true".to_string(),
                    };
                    attrs.insert(key, value);
                }
                other => bail!("unexpected token in attribute list: {:?}", other),
            }
        }
    }

    fn touch_node(&mut self, id: &str, scope: &mut Scope) {
        if !self.pdg.contains(id) {
            self.pdg.ensure_node(id);
            scope.members.push(id.to_string());
        }
    }

    fn declare_node(&mut self, id: &str, attrs: BTreeMap<String, String>, scope: &mut Scope) {
        let existing = self.pdg.node(id).cloned();
        if existing.is_none() {
            scope.members.push(id.to_string());
        }
        let mut node = existing.unwrap_or_else(|| PdgNode::new(id, id));
        for (key, value) in attrs {
            match key.as_str() {
                "label" => node.set_label(value),
                "span" => match Span::parse(&value) {
                    Some(span) => node.span = Some(span),
                    None => {
                        node.extra.insert(key, value);
                    }
                },
                "cluster" => {
                    self.explicit_cluster.insert(id.to_string());
                    node.cluster = Some(value);
                }
                "polarity" => {
                    if let Some(p) = Polarity::parse(&value) {
                        node.polarity = p;
                    }
                }
                // Attributes arrive sorted, so an explicit polarity overrides this.
                "color" => node.polarity = Polarity::from_color(&value),
                "community" => node.provenance = value.parse().ok(),
                "filepath" => node.filepath = Some(value),
                _ => {
                    node.extra.insert(key, value);
                }
            }
        }
        self.pdg.add_node(node);
    }
}

fn edge_from_attrs(attrs: BTreeMap<String, String>) -> PdgEdge {
    let kind = ["type", "kind", "label", "style"]
        .iter()
        .find_map(|k| attrs.get(*k))
        .map(|v| EdgeKind::parse(v))
        .unwrap_or_else(|| EdgeKind::Other(String::new()));
    PdgEdge { kind, extra: attrs }
}

/// Parse a DOT document into a PDG.
pub fn parse_dot(input: &str) -> Result<Pdg> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        pdg: Pdg::new(),
        explicit_cluster: Default::default(),
    };
    parser.graph()?;
    Ok(parser.pdg)
}

/// Read a DOT file into a PDG.
pub fn read_dot(path: &Path) -> Result<Pdg> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph {}", path.display()))?;
    parse_dot(&content).with_context(|| format!("Malformed graph {}", path.display()))
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// Render a PDG as DOT. Every node carries its label, span, cluster,
/// polarity with the derived color, provenance and file path.
pub fn to_dot(pdg: &Pdg, name: &str) -> String {
    let mut dot = format!("digraph {} {{\n", quote(name));

    for node in pdg.nodes() {
        let mut attrs: Vec<(String, String)> = vec![("label".into(), quote(&node.label))];
        if let Some(span) = node.span {
            attrs.push(("span".into(), quote(&span.to_string())));
        }
        if let Some(cluster) = &node.cluster {
            attrs.push(("cluster".into(), quote(cluster)));
        }
        if node.polarity.is_colored() || !node.role.is_anchor() {
            attrs.push(("color".into(), node.polarity.color().to_string()));
        }
        attrs.push(("polarity".into(), node.polarity.as_str().to_string()));
        if let Some(community) = node.provenance {
            attrs.push(("community".into(), community.to_string()));
        }
        if let Some(filepath) = &node.filepath {
            attrs.push(("filepath".into(), quote(filepath)));
        }
        for (key, value) in &node.extra {
            attrs.push((key.clone(), quote(value)));
        }
        let rendered: Vec<String> = attrs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        let _ = writeln!(dot, "  {} [{}];", quote(&node.id), rendered.join(", "));
    }

    for (source, target, edge) in pdg.edges() {
        let mut attrs: Vec<String> = Vec::new();
        if !edge.extra.contains_key("type") {
            attrs.push(format!("type={}", quote(edge.kind.as_str())));
        }
        for (key, value) in &edge.extra {
            attrs.push(format!("{}={}", key, quote(value)));
        }
        let _ = writeln!(
            dot,
            "  {} -> {} [{}];",
            quote(source),
            quote(target),
            attrs.join(", ")
        );
    }

    dot.push_str("}\n");
    dot
}
