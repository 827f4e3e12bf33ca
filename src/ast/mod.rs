//! Abstract Syntax Tree
//!
//! Node types consumed by the executor. The parser produces these; the
//! expansion pipeline consumes the word parts embedded in them.

pub mod types;

pub use types::*;
