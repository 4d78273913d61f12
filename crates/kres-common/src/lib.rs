//! Common types and utilities for the kres call-resolution engine.
//!
//! This crate provides foundational types used across all kres crates:
//! - String interning (`Atom`, `Interner`)
//! - Source spans (`Span`)
//! - Engine limits and thresholds
//! - Diagnostic categories and stable diagnostic codes

// String interning for identifier deduplication
pub mod interner;
pub use interner::{Atom, Interner};

// Span - Source location tracking (byte offsets)
pub mod span;
pub use span::Span;

// Centralized limits and thresholds
pub mod limits;

// Diagnostic categories and codes shared by the solver and the resolver
pub mod diagnostics;
pub use diagnostics::{DiagnosticCategory, diagnostic_codes};

#[cfg(test)]
#[path = "../tests/interner_tests.rs"]
mod interner_tests;
