//! gosugar: a Go dialect with pointer-container sugar.
//!
//! The dialect adds channel literals (`&chan T{n}`), byte coercions
//! (`(*[]T)(b)`, `(*[]T, BigEndian)(b)`) and the `clone`/`free`/`grow`
//! intrinsics. This crate ties the stages together:
//!
//! - [`transpile`] lowers one unit to Go.
//! - [`analyze`] reports clone/free imbalance.
//! - [`check`] does both; analyzer findings never block output.
//! - [`check_all`] runs many units in parallel.
//! - [`document::report`] serves an editor front end.

pub mod batch;
pub mod cache;
pub mod config;
pub mod document;
pub mod pipeline;
pub mod report;
pub mod runtime;

pub use batch::{SourceInput, UnitResult, check_all};
pub use cache::{CacheKey, cache_key};
pub use config::{AnalyzeConfig, Config, ConfigError, RuntimeConfig};
pub use document::{DocumentKey, DocumentReport};
pub use pipeline::{Checked, Transpiled, analyze, check, transpile};
pub use runtime::RUNTIME_SOURCE;

pub use gosugar_syntax::{
    Binding, CaseConfig, Category, Check, ContainerKind, Diagnostic, Position, Severity,
    to_dialect_case, to_host_case,
};
