//! ragdb-core
//!
//! Domain types, error taxonomy, configuration and collaborator traits shared
//! by the retrieval crates, plus the sentence-aligned chunker used at
//! ingestion time.

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
