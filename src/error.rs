//! Errors raised when a caller violates a construction contract.
//!
//! Precision loss during analysis is never reported here: it is expressed
//! as a lattice value (`Top` or `Bottom`) instead.

use std::fmt;

/// Error type for domain construction and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A byte slice did not have the exact width required.
    InvalidWidth { expected: usize, found: usize },
    /// A push immediate wider than one machine word.
    ImmediateTooLong { len: usize },
    /// A rejected [`Config`][crate::config::Config].
    InvalidConfig(String),
    /// A byte that does not correspond to any assigned opcode.
    UnknownOpcode(u8),
    /// A failure reported by a [`StorageSource`][crate::env::StorageSource].
    Storage(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::InvalidWidth { expected, found } => {
                write!(f, "expected exactly {} bytes, found {}", expected, found)
            }
            DomainError::ImmediateTooLong { len } => {
                write!(f, "push immediate of {} bytes exceeds the 32-byte word", len)
            }
            DomainError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            DomainError::UnknownOpcode(byte) => write!(f, "unknown opcode 0x{:02x}", byte),
            DomainError::Storage(msg) => write!(f, "storage lookup failed: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DomainError>;
