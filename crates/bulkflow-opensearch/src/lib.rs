//! bulkflow-opensearch — OpenSearch `_bulk` indexing as a BulkFlow
//! [`Sink`](bulkflow_core::Sink).
//!
//! Features:
//! - NDJSON bulk bodies with one `index` action per document
//! - Optional basic auth, optional TLS verification
//! - Item-level rejections surface as a failed batch

pub mod bulk;
pub mod config;
pub mod writer;

pub use bulk::build_bulk_body;
pub use config::{BasicAuth, BulkWriterConfig};
pub use writer::BulkWriter;
