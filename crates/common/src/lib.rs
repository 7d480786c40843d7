//! Common types and utilities shared across all crates

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
