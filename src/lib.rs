//! Hybrid sparse/dense vector kernels
//!
//! Element-wise operators over a vector representation that is either fully
//! materialized or stored as sorted (index, value) pairs, plus a concurrent
//! cache that maps runtime type tuples to resolved kernels.

pub mod apply;
pub mod buffer;
pub mod cache;
pub mod core;
pub mod iter;
pub mod kernels;
pub mod persistence;

// Re-export main types
pub use crate::cache::DispatchCache;
pub use crate::core::error::*;
pub use crate::core::traits::*;
pub use crate::core::types::*;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
