//! Centralized limits and thresholds for the resolution engine.
//!
//! This module provides shared constants for recursion depths, iteration
//! counts, and inline capacities used throughout the codebase. Configurable
//! limits (the completion iteration bound, the nested resolution depth) take
//! their defaults from here; the rest are fixed.
//!
//! # Categories
//!
//! - **Recursion Depths**: Limits to prevent stack overflow in recursive algorithms
//! - **Iteration Counts**: Limits to prevent non-termination in fixpoint loops
//! - **Capacity Limits**: Inline sizes for small collections

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum depth for structural subtype checking.
///
/// Subtype checks recurse through class arguments and function parameter
/// lists. A recursive generic bound such as `T : Comparable<T>` never loops by
/// itself, but pathological declarations can nest arbitrarily; at this depth
/// the check answers `false`.
pub const MAX_SUBTYPE_DEPTH: u32 = 100;

/// Maximum depth for structural constraint decomposition.
///
/// Decomposing `List<List<T>> <: Iterable<Iterable<S>>` adds one level per
/// type-argument layer. When exceeded, the constraint is recorded as a
/// contradiction instead of recursing further.
pub const MAX_CONSTRAINT_RECURSION_DEPTH: u32 = 100;

/// Default maximum nesting of recursive sub-resolutions.
///
/// Every argument, receiver, and lambda body resolves recursively from inside
/// the enclosing call's resolution:
///
/// ```text
/// f(g(h(listOf(1).map { x -> k(x) })))
/// ```
///
/// Exceeding the depth reports `RecursionInInference` on the innermost call.
pub const DEFAULT_MAX_RESOLUTION_DEPTH: u32 = 64;

/// Maximum depth of a least-upper-bound computation.
///
/// `common_supertype(List<List<Int>>, List<List<Long>>)` recurses once per
/// covariant argument layer. Past this depth the result widens to `Any`.
pub const MAX_COMMON_SUPERTYPE_DEPTH: u32 = 20;

// =============================================================================
// Iteration Limits
// =============================================================================

/// Default bound on completion-engine iterations for one call.
///
/// Counts analyses of postponed arguments (lambdas and callable references);
/// variable fixations are not counted since each one removes a variable.
/// Running past the bound means the deferred work keeps producing new work
/// (recursive generic dependency) and is reported as `RecursionInInference`.
pub const DEFAULT_MAX_COMPLETION_ITERATIONS: u32 = 64;

/// Maximum number of incorporation steps for a single constraint system.
///
/// Incorporation closes bounds transitively (`L <: T <: U` implies `L <: U`).
/// Each step is cheap, but a system with cyclic variable dependencies could
/// keep generating derived constraints; when exceeded, further derived
/// constraints are dropped and the system is marked contradictory.
pub const MAX_INCORPORATION_STEPS: u32 = 10_000;

/// Remaining stack below which nested resolution switches to a new segment.
pub const STACK_RED_ZONE: usize = 32 * 1024;

/// Size of each stack segment allocated for nested resolution.
pub const STACK_GROWTH: usize = 2 * 1024 * 1024;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Inline capacity for type argument and parameter lists.
pub const TYPE_LIST_INLINE: usize = 4;

/// Inline capacity for per-candidate diagnostics.
pub const CANDIDATE_DIAGNOSTICS_INLINE: usize = 2;

/// Maximum number of candidates listed in an ambiguity diagnostic.
pub const AMBIGUITY_CANDIDATE_LIMIT: usize = 8;
