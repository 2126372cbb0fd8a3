//! Lowering and emission for the gosugar dialect.
//!
//! [`transform`] reads a parsed [`gosugar_syntax::SourceUnit`] and its
//! binding table and records [`Rewrites`]; [`emit`] writes the tree back out
//! with those rewrites applied. [`layout`] models the byte-level semantics of
//! coercions.

pub mod emit;
pub mod layout;
pub mod lower;
pub mod rewrite;

pub use emit::{Emitter, emit};
pub use layout::{ByteOrder, ElemLayout, LayoutError};
pub use lower::{
    DEFAULT_RUNTIME_ALIAS, DEFAULT_RUNTIME_IMPORT, TransformConfig, Transformed, transform,
};
pub use rewrite::{Piece, Rewrites};
