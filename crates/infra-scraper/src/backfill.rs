//! Backfill run: drain every endpoint and write one artifact per endpoint.
//!
//! Each artifact is a GeoJSON `FeatureCollection` written wholesale to
//! `<output_dir>/<name>.geojson`. An endpoint whose extraction fails gets
//! no artifact (a previous one is left untouched) and the run moves on.

use std::path::{Path, PathBuf};

use infra_core::{ExtractionError, PageSource, PaginatedExtractor};
use infra_types::FeatureCollection;
use tracing::{error, info};

/// Why one endpoint produced no artifact.
#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    /// Extraction failed; nothing was written.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The collection could not be encoded.
    #[error("failed to encode {name}: {source}")]
    Encode {
        /// Endpoint name.
        name: String,
        /// The encoder error.
        source: serde_json::Error,
    },

    /// The artifact could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Artifact path.
        path: PathBuf,
        /// The I/O error.
        source: std::io::Error,
    },
}

/// Outcome of one endpoint in a run.
#[derive(Debug)]
pub struct EndpointReport {
    /// Endpoint name.
    pub name: String,
    /// Artifact path and feature count, or the failure.
    pub result: Result<(PathBuf, usize), BackfillError>,
}

/// Path of the artifact for endpoint `name`.
pub fn artifact_path(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("{name}.geojson"))
}

/// Write `collection` as the artifact of endpoint `name`.
pub async fn write_artifact(
    output_dir: &Path,
    name: &str,
    collection: &FeatureCollection,
) -> Result<PathBuf, BackfillError> {
    let path = artifact_path(output_dir, name);
    let encoded = collection
        .to_geojson()
        .and_then(|doc| serde_json::to_vec(&doc))
        .map_err(|source| BackfillError::Encode {
            name: name.to_owned(),
            source,
        })?;
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| BackfillError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(&path, encoded)
        .await
        .map_err(|source| BackfillError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Drain `sources` and write their artifacts, one report per source in
/// input order.
pub async fn run_backfill<S: PageSource>(
    sources: &[S],
    output_dir: &Path,
    extractor: &PaginatedExtractor,
    parallel: bool,
) -> Vec<EndpointReport> {
    let mut reports = Vec::with_capacity(sources.len());
    for (name, extracted) in extractor.extract_each(sources, parallel).await {
        let result = match extracted {
            Ok(collection) => write_artifact(output_dir, name, &collection)
                .await
                .map(|path| (path, collection.len())),
            Err(err) => Err(BackfillError::from(err)),
        };
        match &result {
            Ok((path, count)) => {
                info!(endpoint = name, path = %path.display(), features = count, "wrote artifact");
            }
            Err(err) => error!(endpoint = name, error = %err, "endpoint skipped"),
        }
        reports.push(EndpointReport {
            name: name.to_owned(),
            result,
        });
    }
    reports
}
