//! The per-unit pipeline.
//!
//! ```text
//!   source ─► parse ─► track ─┬─► transform ─► emit ─► host text
//!                             └─► analyze ───────────► findings
//! ```
//!
//! Each entry point is pure: the same source and config always give the
//! same output. Failures come back as diagnostics; nothing panics across a
//! unit boundary.

use crate::config::Config;
use gosugar_syntax::diagnostic::{self, has_fatal};
use gosugar_syntax::{Binding, Diagnostic, SourceUnit, track};
use gosugar_transform::{emit, transform};
use serde::Serialize;

/// Result of [`transpile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transpiled {
    /// Go source, absent when a fatal diagnostic was reported.
    pub host: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Transpiled {
    pub fn is_ok(&self) -> bool {
        self.host.is_some()
    }
}

/// Result of [`check`]: transpilation plus analyzer findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checked {
    pub host: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Everything one run produced.
pub(crate) struct Run {
    pub host: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub bindings: Vec<Binding>,
}

pub(crate) fn run(source: &str, config: &Config, transpile: bool, analyze: bool) -> Run {
    let unit = match SourceUnit::parse(source) {
        Ok(unit) => unit,
        Err(err) => {
            tracing::debug!(error = %err, "parse failed");
            return Run {
                host: None,
                diagnostics: vec![err.to_diagnostic()],
                bindings: Vec::new(),
            };
        }
    };

    let tracked = track(&unit);
    let mut diagnostics = tracked.diagnostics;
    let mut host = None;

    if transpile && !has_fatal(&diagnostics) {
        let transformed = transform(&unit, &tracked.table, &config.transform());
        diagnostics.extend(transformed.diagnostics);
        if !has_fatal(&diagnostics) {
            host = Some(emit(&unit, &transformed.rewrites));
        }
    }

    if analyze {
        diagnostics.extend(
            gosugar_analyze::analyze(&unit, &tracked.table)
                .into_iter()
                .filter(|d| config.analyze.allows(d.check.as_str())),
        );
    }

    diagnostic::sort(&mut diagnostics);
    tracing::debug!(
        emitted = host.is_some(),
        diagnostics = diagnostics.len(),
        "pipeline finished"
    );
    Run {
        host,
        diagnostics,
        bindings: tracked.table.bindings().to_vec(),
    }
}

/// Lower dialect source to Go.
pub fn transpile(source: &str, config: &Config) -> Transpiled {
    let run = run(source, config, true, false);
    Transpiled {
        host: run.host,
        diagnostics: run.diagnostics,
    }
}

/// Memory analyzer findings for dialect source, or the parse error.
pub fn analyze(source: &str, config: &Config) -> Vec<Diagnostic> {
    run(source, config, false, true).diagnostics
}

/// Transpile and analyze in one pass. Analyzer findings never block output.
pub fn check(source: &str, config: &Config) -> Checked {
    let run = run(source, config, true, true);
    Checked {
        host: run.host,
        diagnostics: run.diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gosugar_syntax::Check;

    #[test]
    fn test_parse_failure_is_one_error() {
        let out = transpile("package p\n\nfunc f( {\n", &Config::default());
        assert!(out.host.is_none());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].check, Check::ParseError);
    }

    #[test]
    fn test_conflict_blocks_output() {
        let out = transpile(
            "package p\n\nfunc f() {\n\tx := &[]int{}\n\tx = &map[int]int{}\n}\n",
            &Config::default(),
        );
        assert!(!out.is_ok());
        assert_eq!(out.diagnostics[0].check, Check::ClassificationConflict);
    }

    #[test]
    fn test_analysis_does_not_block_output() {
        let out = check(
            "package p\n\nfunc f(s *[]int) {\n\tfree(s)\n\tfree(s)\n}\n",
            &Config::default(),
        );
        assert!(out.host.is_some());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].check, Check::DoubleFree);
    }

    #[test]
    fn test_transpile_skips_analysis() {
        let out = transpile(
            "package p\n\nfunc f(s *[]int) {\n\tfree(s)\n\tfree(s)\n}\n",
            &Config::default(),
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_disabled_check_filtered() {
        let mut config = Config::default();
        config.analyze.disabled.insert("double_free".to_string());
        let diags = analyze("package p\n\nfunc f(s *[]int) {\n\tfree(s)\n\tfree(s)\n}\n", &config);
        assert!(diags.is_empty());
    }
}
