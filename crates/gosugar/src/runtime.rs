//! The Go runtime package that lowered code calls into.
//!
//! Ship [`RUNTIME_SOURCE`] as `sugar.go` at the configured import path.

/// Source of the runtime package.
pub const RUNTIME_SOURCE: &str = include_str!("../runtime/sugar.go");

/// Go package name declared by [`RUNTIME_SOURCE`].
pub const RUNTIME_PACKAGE: &str = "sugar";

/// Runtime functions lowered code may reference.
pub const RUNTIME_FUNCTIONS: &[&str] = &[
    "Clone",
    "CloneSlice",
    "CloneMap",
    "CloneString",
    "Free",
    "FreeSlice",
    "FreeMap",
    "FreeString",
    "GrowSlice",
    "Cast",
    "CastOrder",
];
