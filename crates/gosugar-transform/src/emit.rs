//! Serializes the parsed tree plus its rewrites back to Go source.

use crate::rewrite::{Piece, Rewrites};
use gosugar_syntax::SourceUnit;
use tree_sitter::Node;

/// Writes the tree in source order, substituting rewritten nodes.
///
/// Text between children (whitespace, comments, punctuation) is copied
/// verbatim, so untouched code round-trips byte for byte.
pub struct Emitter<'a, 't> {
    unit: &'t SourceUnit,
    rewrites: &'a Rewrites<'t>,
    output: String,
}

impl<'a, 't> Emitter<'a, 't> {
    pub fn new(unit: &'t SourceUnit, rewrites: &'a Rewrites<'t>) -> Self {
        Self {
            unit,
            rewrites,
            output: String::with_capacity(unit.text().len() + 64),
        }
    }

    /// Emit the whole unit.
    pub fn emit(unit: &'t SourceUnit, rewrites: &'a Rewrites<'t>) -> String {
        let mut emitter = Self::new(unit, rewrites);
        emitter.write_unit();
        emitter.output
    }

    fn write_unit(&mut self) {
        let text = self.unit.text();
        let root = self.unit.root();
        if let Some(prelude) = self.rewrites.prelude() {
            self.output.push_str(prelude);
        }
        self.output.push_str(&text[..root.start_byte()]);
        self.write_node(root);
        self.output.push_str(&text[root.end_byte()..]);
    }

    fn write_node(&mut self, node: Node<'t>) {
        if let Some(pieces) = self.rewrites.replacement(node) {
            for piece in pieces {
                match piece {
                    Piece::Text(text) => self.output.push_str(text),
                    Piece::Node(child) => self.write_node(*child),
                }
            }
        } else {
            self.write_source(node);
        }
        if let Some(suffix) = self.rewrites.suffix(node) {
            self.output.push_str(suffix);
        }
    }

    fn write_source(&mut self, node: Node<'t>) {
        let text = self.unit.text();
        let mut cursor = node.start_byte();
        let mut walker = node.walk();
        for child in node.children(&mut walker) {
            self.output.push_str(&text[cursor..child.start_byte()]);
            self.write_node(child);
            cursor = child.end_byte();
        }
        self.output.push_str(&text[cursor..node.end_byte()]);
    }
}

/// Emit `unit` with `rewrites` applied.
pub fn emit<'t>(unit: &'t SourceUnit, rewrites: &Rewrites<'t>) -> String {
    Emitter::emit(unit, rewrites)
}
