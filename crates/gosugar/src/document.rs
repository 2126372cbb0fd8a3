//! Per-document reports for an editor front end.
//!
//! The front end owns protocol framing and document lifecycle; it hands over
//! a URI, a version and the current text, and gets back the binding table
//! and every diagnostic for that exact version.

use crate::config::Config;
use crate::pipeline;
use gosugar_syntax::{Binding, Diagnostic};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DocumentKey {
    pub uri: String,
    pub version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReport {
    #[serde(flatten)]
    pub key: DocumentKey,
    pub bindings: Vec<Binding>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Bindings and diagnostics (transform and analyzer) for one document version.
pub fn report(key: DocumentKey, text: &str, config: &Config) -> DocumentReport {
    let run = pipeline::run(text, config, true, true);
    tracing::debug!(uri = %key.uri, version = key.version, "document report");
    DocumentReport {
        key,
        bindings: run.bindings,
        diagnostics: run.diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gosugar_syntax::{Check, ContainerKind};

    fn key(version: i32) -> DocumentKey {
        DocumentKey {
            uri: "file:///w/main.go".to_string(),
            version,
        }
    }

    #[test]
    fn test_report_lists_bindings_and_findings() {
        let text = "package p\n\nfunc f() {\n\tm := &map[string]int{}\n\tc := clone(m)\n\t_ = len(*c)\n}\n";
        let report = report(key(3), text, &Config::default());
        assert_eq!(report.key.version, 3);

        let m = report.bindings.iter().find(|b| b.name == "m").unwrap();
        assert_eq!(m.kind, ContainerKind::Map);
        let c = report.bindings.iter().find(|b| b.name == "c").unwrap();
        assert_eq!(c.kind, ContainerKind::Map);

        let checks: Vec<_> = report.diagnostics.iter().map(|d| d.check).collect();
        assert_eq!(checks, vec![Check::MissingFree]);
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = report(key(1), "package p\n", &Config::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["uri"], "file:///w/main.go");
        assert_eq!(json["version"], 1);
        assert!(json["diagnostics"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_parse_error_has_no_bindings() {
        let report = report(key(2), "package p\n\nfunc f( {\n", &Config::default());
        assert!(report.bindings.is_empty());
        assert_eq!(report.diagnostics.len(), 1);
    }
}
