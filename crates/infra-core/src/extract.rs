//! Paginated extraction of complete feature collections.
//!
//! Query endpoints cap the number of records per response and set a
//! truncation flag when more remain. [`PaginatedExtractor`] drains an
//! endpoint by re-requesting at increasing offsets until a page comes back
//! untruncated. Pages within one endpoint are strictly sequential because
//! each offset depends on the previous page's record count.

use std::future::Future;

use futures::future::join_all;
use infra_types::FeatureCollection;
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, LayerError};
use crate::retry::RetryPolicy;

/// A paginated, limit-truncating query endpoint.
pub trait PageSource: Send + Sync {
    /// Logical dataset name, used for logging, errors and artifact names.
    fn name(&self) -> &str;

    /// Fetch the page starting at `offset` with all fields, an
    /// unconditional predicate and geometries included.
    fn fetch_page(
        &self,
        offset: u64,
    ) -> impl Future<Output = Result<FeatureCollection, LayerError>> + Send;
}

/// Drains [`PageSource`]s into single feature collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaginatedExtractor {
    retry: RetryPolicy,
}

impl PaginatedExtractor {
    /// Create an extractor retrying transient page failures per `retry`.
    pub const fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Fetch every record of `source`, starting from offset 0.
    ///
    /// The offset advances by the number of records actually received and
    /// only after a page has been accepted, so a retried page is re-issued
    /// at the same offset. Any failure discards the records accumulated so
    /// far.
    pub async fn extract_all<S: PageSource>(
        &self,
        source: &S,
    ) -> Result<FeatureCollection, ExtractionError> {
        let endpoint = source.name();
        let mut features = Vec::new();
        let mut offset: u64 = 0;
        let mut pages: u32 = 0;

        loop {
            let page = self
                .retry
                .run(endpoint, || source.fetch_page(offset))
                .await
                .map_err(|err| ExtractionError::Upstream {
                    endpoint: endpoint.to_owned(),
                    offset,
                    source: err,
                })?;
            pages = pages.saturating_add(1);

            let received = page.len();
            let truncated = page.exceeded_transfer_limit;
            debug!(endpoint, offset, received, truncated, "page received");

            if truncated && received == 0 {
                return Err(ExtractionError::Stalled {
                    endpoint: endpoint.to_owned(),
                    offset,
                });
            }

            features.extend(page.features);
            if !truncated {
                break;
            }
            offset = offset.saturating_add(u64::try_from(received).unwrap_or(u64::MAX));
        }

        info!(endpoint, pages, features = features.len(), "extraction complete");
        Ok(FeatureCollection::new(features))
    }

    /// Drain several endpoints, returning one result per endpoint in input
    /// order. A failing endpoint does not stop the others.
    ///
    /// With `parallel`, endpoints are drained concurrently; pagination
    /// within each endpoint stays sequential either way.
    pub async fn extract_each<'a, S: PageSource>(
        &self,
        sources: &'a [S],
        parallel: bool,
    ) -> Vec<(&'a str, Result<FeatureCollection, ExtractionError>)> {
        let results = if parallel {
            join_all(sources.iter().map(|source| self.extract_all(source))).await
        } else {
            let mut results = Vec::with_capacity(sources.len());
            for source in sources {
                results.push(self.extract_all(source).await);
            }
            results
        };

        sources
            .iter()
            .zip(results)
            .map(|(source, result)| {
                if let Err(err) = &result {
                    warn!(endpoint = source.name(), error = %err, "extraction failed");
                }
                (source.name(), result)
            })
            .collect()
    }
}
