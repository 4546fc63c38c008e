//! CLI command implementations.

pub mod compose;
pub mod config;
pub mod describe;
