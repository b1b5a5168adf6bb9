//! # Segwatch Common
//!
//! Shared types, errors, and constants used across Segwatch components.
//!
//! ## Modules
//! - `types` - Core data structures (Consistency, ReachabilityReport, SegmentReport)
//! - `error` - Common error types
//! - `constants` - Shared configuration defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::SegmentationError;
pub use types::*;
