//! Intraprocedural clone/free balance analysis.
//!
//! Each function and method declaration is one unit; function literals are
//! part of the declaration that contains them. Statements at file level form
//! one extra unit named `<top level>`.
//!
//! Per unit and binding the analyzer counts clone-assignments, `free` calls
//! and plain references, then reports:
//!
//! - `double_free` (error): more than one `free`. Branches are not told apart,
//!   so `if c { free(x) } else { free(x) }` is reported too.
//! - `missing_free` (warning): cloned, never freed.
//! - `unused_allocation` (info): cloned, never referenced afterwards.
//! - `unused_clone` (warning): a `clone` result thrown away.
//!
//! The analysis is syntactic. Ownership passed to a callee that frees it is
//! invisible here and shows up as `missing_free`.

pub mod record;
pub mod rules;

use gosugar_syntax::{BindingTable, Diagnostic, SourceUnit, diagnostic};
use record::Collector;
use tree_sitter::Node;

/// Name of the unit collecting file-level statements.
pub const TOP_LEVEL: &str = "<top level>";

/// Analyze every function of `unit`.
pub fn analyze(unit: &SourceUnit, table: &BindingTable) -> Vec<Diagnostic> {
    let root = unit.root();
    let mut diagnostics = Vec::new();
    let mut top_level = Collector::new(unit, table);
    let mut has_top_level = false;

    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "function_declaration" | "method_declaration" => {
                let name = function_name(unit, node);
                let mut collector = Collector::new(unit, table);
                if let Some(body) = node.child_by_field_name("body") {
                    collector.visit(body);
                }
                diagnostics.extend(rules::run(&name, &collector.finish()));
            }
            "package_clause" | "import_declaration" | "var_declaration"
            | "const_declaration" | "type_declaration" | "comment" => {}
            _ => {
                has_top_level = true;
                top_level.visit(node);
            }
        }
    }
    if has_top_level {
        diagnostics.extend(rules::run(TOP_LEVEL, &top_level.finish()));
    }

    diagnostic::sort(&mut diagnostics);
    tracing::debug!(findings = diagnostics.len(), "analyzed unit");
    diagnostics
}

fn function_name(unit: &SourceUnit, node: Node) -> String {
    let name = node
        .child_by_field_name("name")
        .map_or("<anonymous>", |n| unit.node_text(n));
    let receiver = node
        .child_by_field_name("receiver")
        .and_then(|r| r.named_child(0))
        .and_then(|p| p.child_by_field_name("type"))
        .map(|t| unit.node_text(t).trim_start_matches('*'));
    match receiver {
        Some(receiver) => format!("{receiver}.{name}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gosugar_syntax::{Check, Severity, track};

    fn findings(src: &str) -> Vec<Diagnostic> {
        let unit = SourceUnit::parse(src).unwrap();
        let tracked = track(&unit);
        analyze(&unit, &tracked.table)
    }

    fn checks(diags: &[Diagnostic]) -> Vec<Check> {
        diags.iter().map(|d| d.check).collect()
    }

    #[test]
    fn test_balanced_is_clean() {
        let diags = findings(
            "package p\n\nfunc f(s *[]int) int {\n\tc := clone(s)\n\tdefer free(c)\n\treturn len(*c)\n}\n",
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_double_free_on_exclusive_branches() {
        let diags = findings(
            "package p\n\nfunc f(s *[]int, ok bool) {\n\tif ok {\n\t\tfree(s)\n\t} else {\n\t\tfree(s)\n\t}\n}\n",
        );
        assert_eq!(checks(&diags), vec![Check::DoubleFree]);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].position.line, 7);
        assert_eq!(diags[0].message, "`s` is freed 2 times in `f`");
    }

    #[test]
    fn test_three_frees_one_error() {
        let diags = findings(
            "package p\n\nfunc f(s *[]int) {\n\tfree(s)\n\tfree(s)\n\tfree(s)\n}\n",
        );
        assert_eq!(checks(&diags), vec![Check::DoubleFree]);
    }

    #[test]
    fn test_missing_free() {
        let diags = findings(
            "package p\n\nfunc f(s *[]int) int {\n\tc := clone(s)\n\treturn len(*c)\n}\n",
        );
        assert_eq!(checks(&diags), vec![Check::MissingFree]);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[0].hint.as_deref(), Some("add `defer free(c)` after the clone"));
    }

    #[test]
    fn test_unused_clone() {
        let diags = findings(
            "package p\n\nfunc f(s *[]int) {\n\tclone(s)\n\t_ = clone(s)\n}\n",
        );
        assert_eq!(checks(&diags), vec![Check::UnusedClone, Check::UnusedClone]);
    }

    #[test]
    fn test_unused_allocation() {
        let diags = findings(
            "package p\n\nfunc f(s *[]int) {\n\tc := clone(s)\n\tfree(c)\n}\n",
        );
        assert_eq!(checks(&diags), vec![Check::UnusedAllocation]);
        assert_eq!(diags[0].severity, Severity::Info);
    }

    #[test]
    fn test_functions_are_separate() {
        let diags = findings(
            "package p\n\nfunc a(s *[]int) { free(s) }\n\nfunc b(s *[]int) { free(s) }\n",
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_func_literal_belongs_to_enclosing() {
        let diags = findings(
            "package p\n\nfunc f(s *[]int) {\n\tfree(s)\n\tgo func() {\n\t\tfree(s)\n\t}()\n}\n",
        );
        assert_eq!(checks(&diags), vec![Check::DoubleFree]);
    }

    #[test]
    fn test_top_level_statements() {
        let diags = findings("s := &[]int{1}\nc := clone(s)\n_ = len(*c)\n");
        assert_eq!(checks(&diags), vec![Check::MissingFree]);
        assert!(diags[0].message.ends_with("`<top level>`"));
    }

    #[test]
    fn test_channel_scenario_is_clean() {
        let diags = findings("ch2 := &chan string{2}; ch2 <- \"A\"; ch2 <- \"B\"\n");
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_shadowed_free_is_not_counted() {
        let diags = findings(
            "package p\n\nfunc free(x *[]int) {}\n\nfunc f(s *[]int) {\n\tfree(s)\n\tfree(s)\n}\n",
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_method_name() {
        let diags = findings(
            "package p\n\ntype T struct{}\n\nfunc (t *T) run(s *[]int) {\n\tfree(s)\n\tfree(s)\n}\n",
        );
        assert_eq!(diags[0].message, "`s` is freed 2 times in `T.run`");
    }
}
