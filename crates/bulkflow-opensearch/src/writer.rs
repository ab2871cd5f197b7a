//! OpenSearch bulk writer backed by `reqwest`.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;

use bulkflow_core::{Record, Sink, SinkError};

use crate::bulk::{build_bulk_body, check_response};
use crate::config::BulkWriterConfig;

/// Indexes batches of JSON documents with the `_bulk` API.
///
/// One `commit` is one bulk request. A batch is reported as failed if the
/// request fails, returns a non-2xx status, or any document in it is rejected.
/// Nothing is retried.
pub struct BulkWriter {
    config: BulkWriterConfig,
    url: String,
    http: reqwest::Client,
}

impl BulkWriter {
    pub fn new(config: BulkWriterConfig) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| SinkError::Http(format!("failed to build HTTP client: {e}")))?;

        if config.accept_invalid_certs {
            tracing::warn!(host = %config.host, "TLS certificate verification is disabled");
        }
        tracing::info!(host = %config.host, index = %config.index, "writing data to index");

        Ok(Self {
            url: config.bulk_url(),
            config,
            http,
        })
    }

    async fn send(&self, body: String) -> Result<String, SinkError> {
        let mut req = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        if let Some(auth) = &self.config.auth {
            req = req.basic_auth(&auth.user, Some(&auth.password));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl Sink for BulkWriter {
    async fn commit(&self, batch: &[Record], _cancel: &CancellationToken) -> Result<(), SinkError> {
        let (body, docs) = build_bulk_body(&self.config.index, batch);
        if docs == 0 {
            tracing::debug!(index = %self.config.index, "empty batch, skipping bulk request");
            return Ok(());
        }

        let started = std::time::Instant::now();
        let response = self.send(body).await?;
        check_response(&response, docs)?;

        tracing::debug!(
            index = %self.config.index,
            docs,
            latency_ms = started.elapsed().as_millis() as u64,
            "bulk request complete"
        );
        Ok(())
    }
}
