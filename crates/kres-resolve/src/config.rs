//! Resolver options.
//!
//! Options are read from a JSON document with camelCase keys. Every key is
//! optional; a missing key keeps its default:
//!
//! ```json
//! {
//!   "safeCallNullability": "whenReceiverNullable",
//!   "maxCompletionIterations": 64,
//!   "maxResolutionDepth": 64,
//!   "builderInference": true,
//!   "unstableSmartCastIsError": false,
//!   "reportWarnings": "yes"
//! }
//! ```

use anyhow::{Context, Result};
use kres_common::limits::{DEFAULT_MAX_COMPLETION_ITERATIONS, DEFAULT_MAX_RESOLUTION_DEPTH};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Nullability of a safe call's result (`a?.f()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SafeCallNullability {
    /// Nullable only when the receiver type may be null.
    #[default]
    WhenReceiverNullable,
    /// Always nullable.
    Always,
}

/// Accepts `true`/`false` and their common string spellings.
fn deserialize_bool_or_string<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::custom(format!(
                "invalid boolean value: '{}'. Expected true, false, 'true', or 'false'",
                s
            ))),
        },
    }
}

fn flag_or<'de, D>(deserializer: D, default: bool) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_bool_or_string(deserializer)?.unwrap_or(default))
}

fn flag_default_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    flag_or(deserializer, true)
}

fn flag_default_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    flag_or(deserializer, false)
}

fn default_true() -> bool {
    true
}

fn default_iterations() -> u32 {
    DEFAULT_MAX_COMPLETION_ITERATIONS
}

fn default_depth() -> u32 {
    DEFAULT_MAX_RESOLUTION_DEPTH
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverOptions {
    #[serde(default)]
    pub safe_call_nullability: SafeCallNullability,
    /// Upper bound on postponed-argument analyses of one completion.
    #[serde(default = "default_iterations")]
    pub max_completion_iterations: u32,
    /// Upper bound on nested expression resolution.
    #[serde(default = "default_depth")]
    pub max_resolution_depth: u32,
    #[serde(default = "default_true", deserialize_with = "flag_default_true")]
    pub builder_inference: bool,
    /// Report unstable smart casts as errors instead of notes on the
    /// failing candidate.
    #[serde(default, deserialize_with = "flag_default_false")]
    pub unstable_smart_cast_is_error: bool,
    #[serde(default = "default_true", deserialize_with = "flag_default_true")]
    pub report_warnings: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            safe_call_nullability: SafeCallNullability::default(),
            max_completion_iterations: DEFAULT_MAX_COMPLETION_ITERATIONS,
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            builder_inference: true,
            unstable_smart_cast_is_error: false,
            report_warnings: true,
        }
    }
}

pub fn parse_options(source: &str) -> Result<ResolverOptions> {
    let options = serde_json::from_str(source).context("failed to parse resolver options JSON")?;
    Ok(options)
}

pub fn load_options(path: &Path) -> Result<ResolverOptions> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read resolver options: {}", path.display()))?;
    parse_options(&source).with_context(|| format!("invalid resolver options: {}", path.display()))
}

#[cfg(test)]
#[path = "../tests/config_tests.rs"]
mod tests;
