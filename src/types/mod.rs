//! Core type definitions for Pattern Warden.
//!
//! This module contains the shared types used across the codebase,
//! organized into sub-modules for different domains.

pub mod rules;
pub mod scan;

// Re-export commonly used types
pub use rules::*;
pub use scan::*;
