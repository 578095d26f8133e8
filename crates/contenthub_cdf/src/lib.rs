//! # Content Hub CDF
//!
//! Canonical Data Format (CDF) types for Content Hub synchronization.
//!
//! This crate provides:
//! - `CdfRecord`, the syndicated form of a single content entity
//! - Typed, language-keyed `Attribute` values
//! - `Asset` entries and their `[<uuid>]` replace tokens
//! - `CdfDocument`, the JSON wire document (`{"entities": [...]}`)
//!
//! This is a pure data crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - A record's `uuid` never changes and is its only identity
//! - Attribute names are unique within a record
//! - Once an attribute name is typed, its type never changes
//! - Every stored attribute value matches its declared type

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod asset;
mod attribute;
mod document;
mod error;
mod record;

pub use asset::Asset;
pub use attribute::{Attribute, AttributeType, BaseType, LANGUAGE_UNDEFINED};
pub use document::CdfDocument;
pub use error::{CdfError, CdfResult};
pub use record::CdfRecord;

/// Re-exported so downstream crates name the same identifier type.
pub use uuid::Uuid;
