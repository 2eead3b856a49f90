//! Runtime limits and buffer policy

use crate::{DEFAULT_BASE_CAPACITY, DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_DEPTH};

/// Codec configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Starting capacity of the output buffer
    pub initial_capacity: usize,
    /// Capacity the output buffer jumps to on first overflow
    pub base_capacity: usize,
    /// Deepest nesting accepted when inferring, encoding or decoding
    pub max_depth: usize,
    /// Reject input that continues after a decoded value
    pub strict_trailing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            base_capacity: DEFAULT_BASE_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            strict_trailing: true,
        }
    }
}

impl Config {
    /// Set the starting buffer capacity
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the base capacity used on first overflow
    pub fn with_base_capacity(mut self, capacity: usize) -> Self {
        self.base_capacity = capacity;
        self
    }

    /// Set the nesting limit
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Accept or reject trailing bytes after a decoded value
    pub fn with_strict_trailing(mut self, strict: bool) -> Self {
        self.strict_trailing = strict;
        self
    }
}
