//! Structured findings shared by every pipeline stage.
//!
//! A [`Diagnostic`] is created once and never mutated afterwards. Stages
//! return them alongside their results instead of failing, so one unit's
//! problems never leak into a sibling unit.

use serde::Serialize;
use std::fmt;
use std::ops::Range;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage family a check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Preprocessing and parsing.
    Syntax,
    /// Pointer-sugar classification.
    Binding,
    /// Lowering of dialect constructs.
    Lowering,
    /// Allocation/free balance. Advisory only.
    Memory,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Syntax => "syntax",
            Category::Binding => "binding",
            Category::Lowering => "lowering",
            Category::Memory => "memory",
        }
    }
}

/// The check that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    ParseError,
    UnsupportedPlaceholder,
    ClassificationConflict,
    MalformedChannel,
    MalformedCoercion,
    CoercionRemainder,
    IntrinsicArity,
    GrowRequiresSlice,
    UnknownContainerKind,
    DoubleFree,
    UnusedClone,
    MissingFree,
    UnusedAllocation,
}

impl Check {
    pub fn as_str(&self) -> &'static str {
        match self {
            Check::ParseError => "parse_error",
            Check::UnsupportedPlaceholder => "unsupported_placeholder",
            Check::ClassificationConflict => "classification_conflict",
            Check::MalformedChannel => "malformed_channel",
            Check::MalformedCoercion => "malformed_coercion",
            Check::CoercionRemainder => "coercion_remainder",
            Check::IntrinsicArity => "intrinsic_arity",
            Check::GrowRequiresSlice => "grow_requires_slice",
            Check::UnknownContainerKind => "unknown_container_kind",
            Check::DoubleFree => "double_free",
            Check::UnusedClone => "unused_clone",
            Check::MissingFree => "missing_free",
            Check::UnusedAllocation => "unused_allocation",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Check::ParseError | Check::UnsupportedPlaceholder => Category::Syntax,
            Check::ClassificationConflict => Category::Binding,
            Check::MalformedChannel
            | Check::MalformedCoercion
            | Check::CoercionRemainder
            | Check::IntrinsicArity
            | Check::GrowRequiresSlice
            | Check::UnknownContainerKind => Category::Lowering,
            Check::DoubleFree
            | Check::UnusedClone
            | Check::MissingFree
            | Check::UnusedAllocation => Category::Memory,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based line and column in the user's source. `(0, 0)` means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const UNKNOWN: Position = Position { line: 0, column: 0 };

    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A position-anchored report from a parse, transform or analysis pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    pub check: Check,
    pub message: String,
    pub hint: Option<String>,
    pub position: Position,
    /// Byte range in the original (pre-preprocessing) source.
    pub span: Option<Range<usize>>,
}

impl Diagnostic {
    pub fn new(severity: Severity, check: Check, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: check.category(),
            check,
            message: message.into(),
            hint: None,
            position: Position::UNKNOWN,
            span: None,
        }
    }

    pub fn error(check: Check, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, check, message)
    }

    pub fn warning(check: Check, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, check, message)
    }

    pub fn info(check: Check, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, check, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn at(mut self, position: Position, span: Option<Range<usize>>) -> Self {
        self.position = position;
        self.span = span;
        self
    }

    /// Errors outside the memory category abort transformation of the unit.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error && self.category != Category::Memory
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}[{}]: {}",
            self.position, self.severity, self.check, self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Whether any diagnostic aborts transformation.
pub fn has_fatal(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_fatal)
}

/// Stable ordering: by position, then check, then message.
pub fn sort(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then(a.check.cmp(&b.check))
            .then_with(|| a.message.cmp(&b.message))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_follows_check() {
        let diag = Diagnostic::warning(Check::MissingFree, "x is never freed");
        assert_eq!(diag.category, Category::Memory);
        assert!(!diag.is_fatal());

        let diag = Diagnostic::error(Check::DoubleFree, "x freed twice");
        assert!(!diag.is_fatal());

        let diag = Diagnostic::error(Check::CoercionRemainder, "4 bytes");
        assert!(diag.is_fatal());
    }

    #[test]
    fn test_display() {
        let diag = Diagnostic::error(Check::ParseError, "unexpected `}`")
            .at(Position::new(3, 7), Some(10..11))
            .with_hint("check the braces");
        assert_eq!(
            diag.to_string(),
            "3:7: error[parse_error]: unexpected `}` (hint: check the braces)"
        );
    }

    #[test]
    fn test_sort_by_position() {
        let mut diags = vec![
            Diagnostic::warning(Check::MissingFree, "b").at(Position::new(5, 1), None),
            Diagnostic::error(Check::DoubleFree, "a").at(Position::new(2, 4), None),
            Diagnostic::error(Check::ParseError, "c"),
        ];
        sort(&mut diags);
        assert_eq!(diags[0].position, Position::UNKNOWN);
        assert_eq!(diags[1].position, Position::new(2, 4));
        assert_eq!(diags[2].position, Position::new(5, 1));
    }
}
