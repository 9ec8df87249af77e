//! diffscope — diff-aware semantic code context retrieval (library crate).
//!
//! Turns a unified diff plus a change description into a small, ranked set
//! of indexed code excerpts. Re-exports public modules for integration
//! tests and external use.

pub mod cache;
pub mod config;
pub mod constants;
pub mod diff;
pub mod embedding;
pub mod env;
pub mod models;
pub mod output;
pub mod retrieval;
pub mod store;

pub use diff::extract_hunks;
pub use output::format_context;
pub use retrieval::{ContextEngine, RetrievalError};
