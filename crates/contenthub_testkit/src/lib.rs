//! # Content Hub Testkit
//!
//! Test utilities for Content Hub sync.
//!
//! This crate provides:
//! - Record builders and ready-made reference graphs (chains, cycles)
//! - Temporary file-backed sync state stores
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use contenthub_testkit::prelude::*;
//!
//! #[test]
//! fn expands_chain() {
//!     let document = chain_document(5);
//!     assert_eq!(document.len(), 5);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
