//! Compiler configuration

use crate::symbol::CORE_NS;

/// Default bound on nested expander invocations for one top-level form.
pub const DEFAULT_MAX_EXPANSION_DEPTH: usize = 256;

/// Default bound on nested closure calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

/// Configuration for the compiler loop.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Namespace a fresh context starts in
    pub namespace: String,

    /// Whether expanded top-level nodes are optimized before evaluation
    pub optimize: bool,

    /// Maximum nesting of user expander and macro invocations
    pub max_expansion_depth: usize,

    /// Maximum nesting of closure calls (stack overflow protection)
    pub max_call_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            namespace: CORE_NS.to_string(),
            optimize: true,
            max_expansion_depth: DEFAULT_MAX_EXPANSION_DEPTH,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl CompilerConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start in a different namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Enable or disable optimization.
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Set the expansion depth bound.
    pub fn with_max_expansion_depth(mut self, depth: usize) -> Self {
        self.max_expansion_depth = depth;
        self
    }

    /// Set the call depth bound.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}
