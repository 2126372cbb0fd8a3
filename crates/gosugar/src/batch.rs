//! Transpile many units in parallel.
//!
//! Units share nothing: a failure in one never affects another, and results
//! come back in input order.

use crate::config::Config;
use crate::pipeline::{self, Checked};
use rayon::prelude::*;
use serde::Serialize;

/// One named source unit.
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub name: String,
    pub source: String,
}

impl SourceInput {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Result for one unit of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitResult {
    pub name: String,
    #[serde(flatten)]
    pub checked: Checked,
}

/// Transpile and analyze every input.
pub fn check_all(inputs: &[SourceInput], config: &Config) -> Vec<UnitResult> {
    tracing::debug!(units = inputs.len(), "checking batch");
    inputs
        .par_iter()
        .map(|input| UnitResult {
            name: input.name.clone(),
            checked: pipeline::check(&input.source, config),
        })
        .collect()
}
