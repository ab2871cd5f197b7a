//! `_bulk` request body and response handling.
//!
//! See <https://opensearch.org/docs/latest/api-reference/document-apis/bulk/>.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use bulkflow_core::{Record, SinkError};

/// Build an NDJSON body with one `index` action per non-empty document.
///
/// Returns the body and the number of documents in it. Document IDs are left
/// to the cluster.
pub fn build_bulk_body(index: &str, docs: &[Record]) -> (String, usize) {
    let action = json!({ "index": { "_index": index } }).to_string();
    let mut body = String::new();
    let mut count = 0;

    for doc in docs.iter().filter(|d| !d.is_empty()) {
        body.push_str(&action);
        body.push('\n');
        body.push_str(doc.as_str());
        body.push('\n');
        count += 1;
    }

    (body, count)
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkItem {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<Value>,
}

impl BulkItem {
    fn failed(&self) -> bool {
        self.error.is_some() || self.status >= 300
    }
}

/// Turn a successful HTTP response body into `Ok` or a partial-failure error.
pub(crate) fn check_response(body: &str, total: usize) -> Result<(), SinkError> {
    let resp: BulkResponse = serde_json::from_str(body)
        .map_err(|e| SinkError::Other(format!("unreadable bulk response: {e}")))?;

    if !resp.errors {
        return Ok(());
    }

    let failed: Vec<&BulkItem> = resp
        .items
        .iter()
        .flat_map(HashMap::values)
        .filter(|item| item.failed())
        .collect();

    let reason = failed
        .first()
        .and_then(|item| item.error.as_ref())
        .map(describe)
        .unwrap_or_else(|| "unknown error".to_string());

    Err(SinkError::PartialFailure {
        failed: failed.len(),
        total,
        reason,
    })
}

fn describe(error: &Value) -> String {
    match (error.get("type"), error.get("reason")) {
        (Some(Value::String(t)), Some(Value::String(r))) => format!("{t}: {r}"),
        (_, Some(Value::String(r))) => r.clone(),
        _ => error.to_string(),
    }
}
