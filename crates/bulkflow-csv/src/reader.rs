//! `CsvSource` — reads CSV rows and returns one JSON document per row.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_util::sync::CancellationToken;

use bulkflow_core::{Record, Source, SourceError};

/// CSV record source.
///
/// The first row is the header row; it is read lazily on the first call to
/// `read`. Every following row becomes a JSON object mapping each header to
/// the field value, in column order.
///
/// Rows are read with blocking `std::io` (stdin included). On a
/// multi-threaded Tokio runtime each read runs under
/// [`tokio::task::block_in_place`] so other tasks keep their worker; on a
/// current-thread runtime it blocks inline. Cancellation is not observed
/// mid-read.
pub struct CsvSource<R> {
    reader: csv::Reader<R>,
    headers: Option<Vec<String>>,
    row: csv::StringRecord,
    rows: u64,
}

impl CsvSource<File> {
    /// Open the CSV file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "reading CSV file");
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> CsvSource<R> {
    /// Read CSV from any reader (e.g. stdin).
    pub fn from_reader(rdr: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(rdr);
        Self {
            reader,
            headers: None,
            row: csv::StringRecord::new(),
            rows: 0,
        }
    }

    /// Header row, once loaded.
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Number of data rows returned so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    fn load_headers(&mut self) -> Result<Vec<String>, SourceError> {
        if !self.reader.read_record(&mut self.row).map_err(convert)? || self.row.is_empty() {
            return Err(SourceError::MissingHeaders);
        }
        let headers: Vec<String> = self.row.iter().map(str::to_string).collect();
        tracing::debug!(columns = headers.len(), "loaded CSV headers");
        Ok(headers)
    }

    fn next_document(&mut self) -> Result<Option<Record>, SourceError> {
        let headers = match &self.headers {
            Some(h) => h,
            None => return Err(SourceError::MissingHeaders),
        };

        if !self.reader.read_record(&mut self.row).map_err(convert)? {
            return Ok(None);
        }

        if self.row.len() != headers.len() {
            let line = self.row.position().map_or(0, csv::Position::line);
            return Err(SourceError::Malformed {
                line,
                reason: format!(
                    "expected {} fields, found {}",
                    headers.len(),
                    self.row.len()
                ),
            });
        }

        let doc = to_document(headers, &self.row);
        self.rows += 1;
        Ok(Some(Record::new(doc)))
    }
}

#[async_trait]
impl<R: Read + Send> Source for CsvSource<R> {
    async fn read(&mut self, _cancel: &CancellationToken) -> Result<Option<Record>, SourceError> {
        blocking(|| {
            if self.headers.is_none() {
                let headers = self.load_headers()?;
                self.headers = Some(headers);
            }
            self.next_document()
        })
    }
}

fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Serialise one row as a JSON object keyed by header.
fn to_document(headers: &[String], row: &csv::StringRecord) -> String {
    let object: Map<String, Value> = headers
        .iter()
        .zip(row.iter())
        .map(|(h, v)| (h.clone(), Value::String(v.to_string())))
        .collect();
    Value::Object(object).to_string()
}

fn convert(err: csv::Error) -> SourceError {
    let line = err.position().map_or(0, csv::Position::line);
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => SourceError::Io(e),
        _ => SourceError::Malformed { line, reason },
    }
}
