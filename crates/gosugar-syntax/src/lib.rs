//! Front end for the gosugar Go dialect.
//!
//! ```text
//!   dialect text
//!       │ preprocess::rewrite     &chan T{..}, (*[]T, Order)(b) -> placeholders
//!       ▼
//!   SourceUnit::parse             tree-sitter-go, positions mapped to raw text
//!       │
//!       ▼
//!   track::track                  binding -> container kind, references, imports
//! ```
//!
//! The tree is never modified after parsing. Lowering and analysis live in
//! `gosugar-transform` and `gosugar-analyze` and read the same tree.

pub mod case;
pub mod diagnostic;
pub mod intrinsic;
pub mod parse;
pub mod preprocess;
pub mod track;

pub use case::{CaseConfig, to_dialect_case, to_host_case};
pub use diagnostic::{Category, Check, Diagnostic, Position, Severity};
pub use intrinsic::{Intrinsic, IntrinsicCall};
pub use parse::{ParseError, SourceUnit};
pub use preprocess::{ChanDir, Preprocessed, Sugar, Substitution};
pub use track::{Binding, BindingId, BindingTable, ContainerKind, ScopeId, Tracked, track};
