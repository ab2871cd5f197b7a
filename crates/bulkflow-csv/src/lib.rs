//! bulkflow-csv — CSV files as a BulkFlow [`Source`](bulkflow_core::Source).
//!
//! Each data row is turned into a JSON object keyed by the header row, ready
//! to be indexed as a document.

pub mod reader;

pub use reader::CsvSource;
