pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod ingest;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use ingest::{CancelToken, IngestHandle, IngestSummary, Ingestor};
pub use store::{DocumentStore, EntityStore, FileStore, MemoryStore, StoreError};
pub use types::*;
