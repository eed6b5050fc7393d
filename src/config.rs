//! Analysis configuration.

use crate::error::{DomainError, Result};

/// Default number of tracked stack slots.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Depth limit of the concrete machine's operand stack.
pub const MAX_STACK_DEPTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of operand-stack slots tracked by every state.
    pub window_size: usize,
    /// Track memory contents; when off, `MLOAD` yields `Top` and stores only pop.
    pub track_memory: bool,
    /// Track storage writes so later `SLOAD`s can read them back.
    pub track_storage: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            track_memory: true,
            track_storage: true,
        }
    }
}

impl Config {
    /// Default configuration with the given window size, validated.
    pub fn with_window_size(window_size: usize) -> Result<Self> {
        let config = Self {
            window_size,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size < 2 {
            return Err(DomainError::InvalidConfig(format!(
                "window size must be at least 2, got {}",
                self.window_size
            )));
        }
        if self.window_size > MAX_STACK_DEPTH {
            return Err(DomainError::InvalidConfig(format!(
                "window size must not exceed the stack limit {}, got {}",
                MAX_STACK_DEPTH, self.window_size
            )));
        }
        Ok(())
    }
}
