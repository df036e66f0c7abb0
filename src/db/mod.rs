//! Storage module for statusboard.
//!
//! Holds the document model and the flat-file JSON store it is persisted in.

mod models;
mod store;

pub use models::*;
pub use store::*;
