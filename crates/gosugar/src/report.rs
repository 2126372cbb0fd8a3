//! Human-readable rendering of diagnostics via codespan-reporting.

use codespan_reporting::diagnostic::{Diagnostic as Report, Label, Severity as Level};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::{self, termcolor::NoColor};
use gosugar_syntax::{Diagnostic, Severity};

fn level(severity: Severity) -> Level {
    match severity {
        Severity::Error => Level::Error,
        Severity::Warning => Level::Warning,
        Severity::Info => Level::Note,
    }
}

/// Render `diagnostics` against `source` as plain text, one block each, in
/// input order.
///
/// Diagnostics without a span fall back to their one-line form.
pub fn render(name: &str, source: &str, diagnostics: &[Diagnostic]) -> String {
    let file = SimpleFile::new(name, source);
    let config = term::Config::default();
    let mut out = String::new();
    for diagnostic in diagnostics {
        match render_one(&file, &config, diagnostic) {
            Some(block) => out.push_str(&block),
            None => out.push_str(&format!("{name}:{diagnostic}\n")),
        }
    }
    out
}

fn render_one(
    file: &SimpleFile<&str, &str>,
    config: &term::Config,
    diagnostic: &Diagnostic,
) -> Option<String> {
    let span = diagnostic
        .span
        .clone()
        .filter(|s| s.end <= file.source().len())?;
    let mut report = Report::new(level(diagnostic.severity))
        .with_code(diagnostic.check.as_str())
        .with_message(&diagnostic.message)
        .with_labels(vec![Label::primary((), span)]);
    if let Some(hint) = &diagnostic.hint {
        report = report.with_notes(vec![format!("hint: {hint}")]);
    }
    let mut writer = NoColor::new(Vec::new());
    if let Err(err) = term::emit(&mut writer, config, file, &report) {
        tracing::warn!(error = %err, "failed to render diagnostic");
        return None;
    }
    Some(String::from_utf8_lossy(writer.get_ref()).into_owned())
}
