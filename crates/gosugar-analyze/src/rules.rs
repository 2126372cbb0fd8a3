//! Balance checks over collected [`UnitRecords`].

use crate::record::{AllocationRecord, Site, UnitRecords};
use gosugar_syntax::{Check, Diagnostic};

/// Run every check for one function.
pub fn run(function: &str, records: &UnitRecords) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for record in records.records.values() {
        double_free(function, record, &mut diagnostics);
        missing_free(function, record, &mut diagnostics);
        unused_allocation(function, record, &mut diagnostics);
    }
    for site in &records.discarded_clones {
        diagnostics.push(located(
            Diagnostic::warning(Check::UnusedClone, "result of `clone` is discarded")
                .with_hint("assign the clone to a variable or remove the call"),
            site,
        ));
    }
    diagnostics
}

fn located(diagnostic: Diagnostic, site: &Site) -> Diagnostic {
    diagnostic.at(site.position, Some(site.span.clone()))
}

/// More than one `free` of the same binding, on any paths.
fn double_free(function: &str, record: &AllocationRecord, out: &mut Vec<Diagnostic>) {
    let Some(second) = record.frees.get(1) else {
        return;
    };
    out.push(located(
        Diagnostic::error(
            Check::DoubleFree,
            format!(
                "`{}` is freed {} times in `{function}`",
                record.name,
                record.frees.len()
            ),
        )
        .with_hint("free each allocation once; frees on exclusive branches are counted together"),
        second,
    ));
}

/// A clone-assigned binding with no `free` anywhere in the function.
fn missing_free(function: &str, record: &AllocationRecord, out: &mut Vec<Diagnostic>) {
    let Some(first) = record.clones.first() else {
        return;
    };
    if !record.frees.is_empty() {
        return;
    }
    out.push(located(
        Diagnostic::warning(
            Check::MissingFree,
            format!("`{}` is cloned but never freed in `{function}`", record.name),
        )
        .with_hint(format!("add `defer free({})` after the clone", record.name)),
        first,
    ));
}

fn unused_allocation(function: &str, record: &AllocationRecord, out: &mut Vec<Diagnostic>) {
    let Some(first) = record.clones.first() else {
        return;
    };
    if record.used() {
        return;
    }
    out.push(located(
        Diagnostic::info(
            Check::UnusedAllocation,
            format!("`{}` is cloned in `{function}` but never used", record.name),
        )
        .with_hint("drop the clone if the copy is not needed"),
        first,
    ));
}
