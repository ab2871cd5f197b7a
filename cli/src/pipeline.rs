//! Wires CSV source → rate limiter → OpenSearch writer and runs the import.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;

use bulkflow_core::{
    CancellationToken, PipelineBuilder, PipelineConfig, RateLimit, RunSummary, Source,
};
use bulkflow_csv::CsvSource;
use bulkflow_opensearch::{BulkWriter, BulkWriterConfig};

use crate::Cli;

/// Run one import. Returns once the input is exhausted or `cancel` fired and
/// the in-progress batch was flushed.
pub async fn run(cli: &Cli, cancel: &CancellationToken) -> Result<RunSummary> {
    let config = PipelineConfig {
        batch_size: cli.batch,
        rate_limit: RateLimit::from_records_per_sec(cli.rate.unwrap_or(0.0)),
        burst: cli.burst,
    };
    config.validate()?;

    let source: Box<dyn Source> = match &cli.csv {
        Some(path) => Box::new(
            CsvSource::from_path(path)
                .with_context(|| format!("failed to open CSV file {}", path.display()))?,
        ),
        None => {
            tracing::info!("reading CSV from stdin");
            Box::new(CsvSource::from_reader(std::io::stdin()))
        }
    };

    let index = index_name(
        cli.csv.as_deref(),
        cli.index.as_deref(),
        Utc::now().timestamp(),
    );
    let mut writer_config =
        BulkWriterConfig::new(&cli.host, index).with_accept_invalid_certs(!cli.verify_certs);
    if let Some(user) = &cli.user {
        writer_config =
            writer_config.with_basic_auth(user, cli.password.clone().unwrap_or_default());
    }
    let writer = BulkWriter::new(writer_config).context("failed to create OpenSearch writer")?;

    tracing::info!(
        batch_size = config.batch_size,
        rate = %config.rate_limit,
        burst = config.effective_burst(),
        "starting import"
    );

    let mut processor = PipelineBuilder::from_config(config).build(source, writer)?;
    let summary = processor.run(cancel).await?;
    Ok(summary)
}

/// Target index: the explicit name, or `<csv base name>_<unix timestamp>`.
///
/// Derived names are lowercased because OpenSearch rejects upper-case index
/// names.
pub fn index_name(csv: Option<&Path>, explicit: Option<&str>, now: i64) -> String {
    if let Some(name) = explicit.filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    let base = csv
        .and_then(Path::file_name)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stdin".to_string());
    let stem = base.strip_suffix(".csv").unwrap_or(&base);
    format!("{}_{now}", stem.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_the_provided_name() {
        let name = index_name(Some(Path::new("my_records.csv")), Some("test"), 1);
        assert_eq!(name, "test");
    }

    #[test]
    fn derives_name_from_file_and_timestamp() {
        let cases = [
            ("/Users/user/data/my_records.csv", "my_records_"),
            ("my_records.csv", "my_records_"),
            ("records", "records_"),
            ("Exports/People.csv", "people_"),
        ];
        for (file, prefix) in cases {
            let name = index_name(Some(Path::new(file)), None, 1_700_000_000);
            assert!(name.starts_with(prefix), "{file}: {name}");
            assert!(name.ends_with("_1700000000"), "{file}: {name}");
        }
    }

    #[test]
    fn empty_explicit_name_is_ignored() {
        assert_eq!(index_name(Some(Path::new("a.csv")), Some(""), 7), "a_7");
    }
}
