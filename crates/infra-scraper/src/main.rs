//! Bulk backfill entry point.
//!
//! Reads the `extraction` section of `infra-config.yaml`, drains every
//! configured query endpoint across all of its pages, and writes one
//! GeoJSON artifact per endpoint into the output directory.
//!
//! ```text
//! endpoint --> PaginatedExtractor (offset 0, n, n+m, ...) --> <output_dir>/<name>.geojson
//! ```
//!
//! A failing endpoint is logged and skipped; the process exits non-zero
//! when any endpoint failed.

mod backfill;

use infra_client::{FeatureServiceClient, QueryEndpoint};
use infra_core::PaginatedExtractor;
use infra_core::config::InfraConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::backfill::run_backfill;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or any endpoint
/// failed to produce an artifact.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("infra-scraper starting");

    let config_path = InfraConfig::default_path();
    let config = InfraConfig::from_file(&config_path)?;
    let extraction = config.extraction;
    info!(
        config = %config_path.display(),
        output_dir = %extraction.output_dir.display(),
        endpoints = extraction.endpoints.len(),
        parallel = extraction.parallel_endpoints,
        max_attempts = extraction.retry.max_attempts,
        "configuration loaded"
    );

    if extraction.endpoints.is_empty() {
        warn!("no endpoints configured, nothing to do");
        return Ok(());
    }

    let client = FeatureServiceClient::new();
    let sources: Vec<QueryEndpoint> = extraction
        .endpoints
        .iter()
        .map(|endpoint| QueryEndpoint::new(client.clone(), &endpoint.name, &endpoint.url))
        .collect();

    let extractor = PaginatedExtractor::new(extraction.retry);
    let reports = run_backfill(
        &sources,
        &extraction.output_dir,
        &extractor,
        extraction.parallel_endpoints,
    )
    .await;

    let failed: Vec<&str> = reports
        .iter()
        .filter(|report| report.result.is_err())
        .map(|report| report.name.as_str())
        .collect();
    info!(
        endpoints = reports.len(),
        failed = failed.len(),
        "backfill finished"
    );

    if failed.is_empty() {
        Ok(())
    } else {
        Err(format!("backfill failed for: {}", failed.join(", ")).into())
    }
}
