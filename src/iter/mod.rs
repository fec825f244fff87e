//! Iteration operators over hybrid vectors

pub mod pair;
pub mod single;

pub use self::pair::*;
pub use self::single::*;
