//! Hybrid retrieval: score fusion, context assembly, the async query
//! pipeline and document ingestion with text extraction.
pub mod api;
pub mod context;
pub mod extract;
pub mod fusion;
pub mod ingest;
pub mod pipeline;

pub use api::{HealthStatus, QueryPurpose, QueryRequest, QueryResponse, QueryResultItem, ResultMetadata};
pub use context::{assemble, AssembledContext};
pub use fusion::{fuse, merge};
pub use ingest::{Ingestor, UploadFile, UploadReport};
pub use pipeline::QueryEngine;
pub use tokio_util::sync::CancellationToken;
