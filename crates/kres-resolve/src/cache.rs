//! Per-expression resolution cache.
//!
//! Each expression is resolved at most once per completion. Lambda bodies
//! may be re-entered by an outer call; the cached entry is returned as-is.
//! A later store for the same expression replaces the earlier one, which
//! is how partially completed results are rewritten once their variables
//! are fixed.

use crate::expr::ExprId;
use crate::results::ExprResolution;
use rustc_hash::FxHashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: FxHashMap<ExprId, Rc<ExprResolution>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, expr: ExprId) -> Option<Rc<ExprResolution>> {
        self.entries.get(&expr).cloned()
    }

    /// Stores `resolution`, returning the entry it replaced.
    pub fn insert(&mut self, expr: ExprId, resolution: Rc<ExprResolution>) -> Option<Rc<ExprResolution>> {
        self.entries.insert(expr, resolution)
    }

    pub fn contains(&self, expr: ExprId) -> bool {
        self.entries.contains_key(&expr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
