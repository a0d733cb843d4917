//! Bulk loaders for Amazon product and review dumps into a Weaviate vector
//! store, plus small count and query tools over the loaded collections.

pub mod cli;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod normalization;
pub mod source;
pub mod store;

pub mod util {
    pub mod env;
}

pub use error::{IngestError, Result};
pub use ingest::{ingest_file, IngestOptions, IngestReport, IngestState, Products, Reviews};
pub use store::weaviate::{WeaviateClient, WeaviateConfig};
