//! Error types for vector kernels and dispatch

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorError {
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("slot {slot} out of range for length {length}")]
    SlotOutOfRange { slot: usize, length: usize },

    #[error("count {count} exceeds length {length}")]
    CountExceedsLength { count: usize, length: usize },

    #[error("backing array too small: need {needed}, have {available}")]
    ShortBuffer { needed: usize, available: usize },

    #[error("source container too small: need {needed}, have {available}")]
    ShortSource { needed: usize, available: usize },

    #[error("sparse indices must be strictly increasing and below length")]
    UnorderedIndices,

    #[error("sparsity threshold must lie in (0, 1), got {0}")]
    InvalidThreshold(f64),

    #[error("arity mismatch: cache built for {expected}, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("kernel resolution failed: {0}")]
    Resolver(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, VectorError>;
