//! CLI command implementations.

pub mod deps;
pub mod inspect;
pub mod state;
