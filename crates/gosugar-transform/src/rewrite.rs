//! Rewrite set produced by lowering and consumed by the emitter.
//!
//! The parsed tree is never touched. A node listed here is emitted as its
//! replacement pieces instead of its own text; everything else is copied.

use std::collections::HashMap;
use tree_sitter::Node;

/// One part of a replacement.
#[derive(Debug, Clone)]
pub enum Piece<'t> {
    /// Literal output text.
    Text(String),
    /// An original node, emitted with its own rewrites applied.
    Node(Node<'t>),
}

impl<'t> From<&str> for Piece<'t> {
    fn from(text: &str) -> Self {
        Piece::Text(text.to_string())
    }
}

impl<'t> From<String> for Piece<'t> {
    fn from(text: String) -> Self {
        Piece::Text(text)
    }
}

impl<'t> From<Node<'t>> for Piece<'t> {
    fn from(node: Node<'t>) -> Self {
        Piece::Node(node)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Rewrites<'t> {
    replacements: HashMap<usize, Vec<Piece<'t>>>,
    suffixes: HashMap<usize, String>,
    prelude: Option<String>,
}

impl<'t> Rewrites<'t> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `pieces` in place of `node`.
    ///
    /// A piece must not be `node` itself or one of its ancestors.
    pub fn replace(&mut self, node: Node<'t>, pieces: Vec<Piece<'t>>) {
        self.replacements.insert(node.id(), pieces);
    }

    pub fn replace_text(&mut self, node: Node<'t>, text: impl Into<String>) {
        self.replace(node, vec![Piece::Text(text.into())]);
    }

    /// Emit `text` right after `node`.
    pub fn append(&mut self, node: Node<'t>, text: impl Into<String>) {
        self.suffixes.entry(node.id()).or_default().push_str(&text.into());
    }

    /// Emit `text` before everything else.
    pub fn set_prelude(&mut self, text: impl Into<String>) {
        self.prelude = Some(text.into());
    }

    pub fn replacement(&self, node: Node) -> Option<&[Piece<'t>]> {
        self.replacements.get(&node.id()).map(Vec::as_slice)
    }

    pub fn suffix(&self, node: Node) -> Option<&str> {
        self.suffixes.get(&node.id()).map(String::as_str)
    }

    pub fn prelude(&self) -> Option<&str> {
        self.prelude.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty() && self.suffixes.is_empty() && self.prelude.is_none()
    }

    /// Number of replaced nodes.
    pub fn len(&self) -> usize {
        self.replacements.len()
    }
}
