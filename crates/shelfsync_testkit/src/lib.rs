//! # Shelfsync Testkit
//!
//! Test utilities for shelfsync.
//!
//! This crate provides:
//! - Document fixtures and file-backed test servers
//! - Property-based test generators using proptest
//! - Invariant checkers for reconciled documents
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use shelfsync_testkit::prelude::*;
//!
//! let doc = scenarios::library(3, 2);
//! assert!(check_invariants(&doc).is_ok());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod invariants;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::invariants::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use invariants::*;
pub use stress::*;
