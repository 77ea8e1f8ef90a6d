//! # Tutorlane Domain
//!
//! Business domain types for the calendar synchronization engine.
//!
//! This crate contains:
//! - Calendar connection, cached event, and booking link models
//! - Domain error types and Result definitions
//! - Provider payload shapes shared by adapters and services
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Tutorlane crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::*;
pub use types::*;
