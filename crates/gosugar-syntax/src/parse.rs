//! Front end: preprocess, parse with tree-sitter-go, index positions.

use crate::diagnostic::{Check, Diagnostic, Position};
use crate::preprocess::{self, Preprocessed};
use std::ops::Range;
use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

/// Longest snippet quoted in a parse error message.
const SNIPPET_LIMIT: usize = 40;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to load Go grammar: {0}")]
    Language(String),
    #[error("tree-sitter produced no tree")]
    NoTree,
    #[error("{position}: {message}")]
    Syntax {
        position: Position,
        span: Option<Range<usize>>,
        message: String,
    },
}

impl ParseError {
    /// The single fatal diagnostic a failed parse turns into.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ParseError::Syntax {
                position,
                span,
                message,
            } => Diagnostic::error(Check::ParseError, message.clone())
                .at(*position, span.clone()),
            other => Diagnostic::error(Check::ParseError, other.to_string()),
        }
    }
}

/// One parsed input file.
///
/// Holds the raw text, the preprocessed text the tree was built from, and a
/// line index over the raw text. Nothing here changes after [`SourceUnit::parse`].
pub struct SourceUnit {
    original: String,
    preprocessed: Preprocessed,
    tree: Tree,
    line_starts: Vec<usize>,
}

impl std::fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceUnit")
            .field("len", &self.original.len())
            .field("substitutions", &self.preprocessed.substitutions.len())
            .finish()
    }
}

impl SourceUnit {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let preprocessed = preprocess::rewrite(source);

        let mut parser = Parser::new();
        parser
            .set_language(&arborium_go::language().into())
            .map_err(|e| ParseError::Language(e.to_string()))?;
        let tree = parser
            .parse(&preprocessed.text, None)
            .ok_or(ParseError::NoTree)?;

        let unit = Self {
            original: source.to_string(),
            line_starts: line_starts(source),
            preprocessed,
            tree,
        };

        if unit.tree.root_node().has_error() {
            return Err(unit.syntax_error());
        }

        tracing::debug!(
            bytes = source.len(),
            substitutions = unit.preprocessed.substitutions.len(),
            "parsed source unit"
        );
        Ok(unit)
    }

    fn syntax_error(&self) -> ParseError {
        let Some(node) = first_error(self.tree.root_node()) else {
            return ParseError::Syntax {
                position: Position::UNKNOWN,
                span: None,
                message: "syntax error".to_string(),
            };
        };

        let message = if node.is_missing() {
            format!("missing `{}`", node.kind())
        } else {
            // Quote the user's text; a partial placeholder cannot be restored.
            let text = self.original.get(self.span(node)).unwrap_or("");
            let line = text.lines().next().unwrap_or("").trim();
            if line.is_empty() {
                "syntax error".to_string()
            } else {
                let snippet: String = line.chars().take(SNIPPET_LIMIT).collect();
                format!("unexpected `{snippet}`")
            }
        };

        ParseError::Syntax {
            position: self.position(node),
            span: Some(self.span(node)),
            message,
        }
    }

    /// The user's text.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The text the tree was parsed from.
    pub fn text(&self) -> &str {
        &self.preprocessed.text
    }

    pub fn preprocessed(&self) -> &Preprocessed {
        &self.preprocessed
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.preprocessed.text.as_bytes())
            .unwrap_or("")
    }

    /// Byte range of `node` in the user's text.
    pub fn span(&self, node: Node) -> Range<usize> {
        self.preprocessed.to_original_range(node.byte_range())
    }

    pub fn position(&self, node: Node) -> Position {
        self.position_of(self.preprocessed.to_original(node.start_byte()))
    }

    /// 1-based line and column (in characters) of a raw-text offset.
    pub fn position_of(&self, offset: usize) -> Position {
        let offset = offset.min(self.original.len());
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        let column = self
            .original
            .get(line_start..offset)
            .map_or(offset - line_start, |s| s.chars().count());
        Position::new(line, column + 1)
    }

    /// Anchor a diagnostic at `node` and strip placeholders from its text.
    pub fn locate(&self, mut diagnostic: Diagnostic, node: Node) -> Diagnostic {
        diagnostic.message = preprocess::restore(&diagnostic.message);
        if let Some(hint) = diagnostic.hint.take() {
            diagnostic.hint = Some(preprocess::restore(&hint));
        }
        diagnostic.at(self.position(node), Some(self.span(node)))
    }
}

fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    node.children(&mut cursor).find_map(first_error)
}

// =============================================================================
// Tree helpers
// =============================================================================

/// Named children, comments excluded.
pub fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

/// Elements of a `literal_value` body, keyed or not.
pub fn literal_elements(body: Node) -> Vec<Node> {
    named_children(body)
        .into_iter()
        .filter(|c| matches!(c.kind(), "literal_element" | "keyed_element"))
        .collect()
}

/// The expression wrapped by a `literal_element`.
pub fn unwrap_literal_element(node: Node) -> Node {
    if node.kind() == "literal_element"
        && let Some(inner) = node.named_child(0)
    {
        return inner;
    }
    node
}

/// Value of a Go integer literal.
pub fn int_literal_value(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        u64::from_str_radix(oct, 8).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        u64::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse().ok()
    }
}
