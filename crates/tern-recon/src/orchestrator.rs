//! Report orchestration: drives every comparison axis, aggregates their
//! results, and manages the report's persisted lifecycle.
//!
//! The orchestrator is the single place errors are caught: input errors
//! reject the request before any state exists; everything after the
//! `Pending` checkpoint is recorded into the tracking record and the report
//! document, never silently swallowed. Checkpoints already persisted are not
//! rolled back on failure; they remain as best-effort diagnostics.
//!
//! Concurrency: bucket reconciliations run under a bounded worker count to
//! avoid overwhelming the storage and inventory APIs. Collection chains run
//! one task per matched collection, unconstrained, since each chain's
//! cursors already rate-limit themselves through page-fetch latency. The
//! aggregation step is a join barrier; no partial result is read while its
//! reconciliation is in flight.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::future;
use futures::stream::{self, StreamExt, TryStreamExt};
use tern_core::catalog::MetadataCatalog;
use tern_core::index::SearchIndex;
use tern_core::inventory::Inventory;
use tern_core::observability::recon_span;
use tern_core::page::RetryConfig;
use tern_core::storage::ObjectStore;
use tern_core::tracking::ReportTracker;
use tern_core::{AccessUrlPolicy, BucketMap, paths};
use tracing::Instrument;

use crate::buckets::BucketReconciler;
use crate::collections::CollectionReconciler;
use crate::error::{ReconError, Result};
use crate::files::FileReconciler;
use crate::granules::{GranuleOutcome, GranuleReconciler};
use crate::params::{NormalizedRequest, ReportRequest};
use crate::report::{ReconciliationReport, ReportFailure, ReportType, StorageComparison};

/// Tunable limits for one orchestrator instance.
///
/// Replaces any ambient environment-derived state: the orchestrator reads
/// nothing but this structure.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Stack-scoped prefix under which report documents are stored.
    pub stack_prefix: String,
    /// Worker bound for concurrent bucket reconciliations.
    pub bucket_concurrency: usize,
    /// Retry policy applied to every cursor's page fetches.
    pub retry: RetryConfig,
    /// Wall-clock budget for one report run, if bounded.
    pub total_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stack_prefix: "tern".to_string(),
            bucket_concurrency: 4,
            retry: RetryConfig::default(),
            total_timeout: None,
        }
    }
}

impl OrchestratorConfig {
    /// Creates a config with the given stack prefix and default limits.
    #[must_use]
    pub fn new(stack_prefix: impl Into<String>) -> Self {
        Self {
            stack_prefix: stack_prefix.into(),
            ..Self::default()
        }
    }

    /// Sets the bucket reconciliation worker bound.
    #[must_use]
    pub fn with_bucket_concurrency(mut self, bound: usize) -> Self {
        self.bucket_concurrency = bound.max(1);
        self
    }

    /// Sets the cursor retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Bounds the total wall-clock time of one report run.
    #[must_use]
    pub const fn with_total_timeout(mut self, budget: Duration) -> Self {
        self.total_timeout = Some(budget);
        self
    }
}

/// Handles to every store the orchestrator reads or writes.
#[derive(Clone)]
pub struct ReconStores {
    /// Object storage: raw listings plus report-document persistence.
    pub storage: Arc<dyn ObjectStore>,
    /// The platform's internal file inventory.
    pub inventory: Arc<dyn Inventory>,
    /// The remote metadata catalog.
    pub catalog: Arc<dyn MetadataCatalog>,
    /// The search index.
    pub index: Arc<dyn SearchIndex>,
    /// Tracking-record store.
    pub tracker: Arc<dyn ReportTracker>,
}

/// Drives a full reconciliation report through its lifecycle.
pub struct ReportOrchestrator {
    stores: ReconStores,
    buckets: BucketMap,
    urls: Arc<dyn AccessUrlPolicy>,
    config: OrchestratorConfig,
}

impl ReportOrchestrator {
    /// Creates an orchestrator over the given stores and policy inputs.
    #[must_use]
    pub fn new(
        stores: ReconStores,
        buckets: BucketMap,
        urls: Arc<dyn AccessUrlPolicy>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            stores,
            buckets,
            urls,
            config,
        }
    }

    /// Generates one reconciliation report.
    ///
    /// The report is persisted in `Pending` state before any comparison
    /// starts, updated as axes complete, and finalized to `Generated` or
    /// `Failed`. On failure the error is recorded and returned; the
    /// partially written document remains queryable.
    ///
    /// # Errors
    ///
    /// Returns `ReconError::InvalidRequest` before any state is persisted
    /// for malformed input, and the underlying error after recording a
    /// failed report for anything else.
    pub async fn create_report(&self, request: ReportRequest) -> Result<ReconciliationReport> {
        let normalized = request.normalize()?;
        let requested_at = Utc::now();
        let name = paths::report_name(normalized.report_type.label(), requested_at);
        let location = paths::report_location(&self.config.stack_prefix, &name);

        // Absence is the normal case here; a hit means a naming collision.
        if self.stores.tracker.get(&name).await?.is_some() {
            return Err(ReconError::invalid_request(format!(
                "a report named '{name}' already exists"
            )));
        }

        let mut report = ReconciliationReport::pending(
            normalized.report_type,
            name.clone(),
            location,
            requested_at,
        );
        self.stores.tracker.create(report.tracking_record()).await?;
        self.persist(&report).await?;
        tracing::info!(
            report = %name,
            report_type = %normalized.report_type,
            one_way = normalized.mode.is_one_way(),
            "reconciliation report started"
        );

        let outcome = match self.config.total_timeout {
            Some(budget) => {
                match tokio::time::timeout(budget, self.generate(&normalized, &mut report)).await {
                    Ok(result) => result,
                    Err(_) => Err(ReconError::Timeout { budget }),
                }
            }
            None => self.generate(&normalized, &mut report).await,
        };

        match outcome {
            Ok(()) => {
                report.mark_generated(Utc::now())?;
                self.persist(&report).await?;
                self.stores.tracker.update(report.tracking_record()).await?;
                tracing::info!(report = %name, "reconciliation report generated");
                Ok(report)
            }
            Err(err) => {
                tracing::error!(report = %name, error = %err, "reconciliation report failed");
                report.mark_failed(
                    ReportFailure {
                        message: "report generation failed".to_string(),
                        cause: err.to_string(),
                    },
                    Utc::now(),
                )?;
                // Best effort: the failed state should be visible, but a
                // persistence failure here must not mask the original error.
                if let Err(persist_err) = self.persist(&report).await {
                    tracing::error!(
                        report = %name,
                        error = %persist_err,
                        "failed to persist failed-report document"
                    );
                }
                if let Err(track_err) = self.stores.tracker.update(report.tracking_record()).await {
                    tracing::error!(
                        report = %name,
                        error = %track_err,
                        "failed to update tracking record"
                    );
                }
                Err(err)
            }
        }
    }

    async fn generate(
        &self,
        request: &NormalizedRequest,
        report: &mut ReconciliationReport,
    ) -> Result<()> {
        match request.report_type {
            ReportType::Inventory | ReportType::GranuleNotFound => {
                self.generate_inventory(request, report).await
            }
            ReportType::Internal => self.generate_internal(request, report).await,
        }
    }

    /// Full four-axis flow: bucket axis first (bounded fan-out), then the
    /// collection -> granule -> file chain.
    async fn generate_inventory(
        &self,
        request: &NormalizedRequest,
        report: &mut ReconciliationReport,
    ) -> Result<()> {
        let storage_files = self
            .reconcile_buckets()
            .instrument(recon_span("storage-files", &report.name))
            .await?;
        report
            .body
            .as_inventory_mut()
            .ok_or_else(|| ReconError::internal("inventory report with non-inventory body"))?
            .storage_files = storage_files;
        // Progressive checkpoint: the bucket axis survives a later failure.
        self.persist(report).await?;

        let collections = CollectionReconciler::new(
            Arc::clone(&self.stores.catalog),
            Arc::clone(&self.stores.index),
        );
        let collection_outcome = collections
            .reconcile(
                request.window.as_ref(),
                request.collections.as_deref(),
                request.mode,
            )
            .instrument(recon_span("collections", &report.name))
            .await?;

        let files = FileReconciler::new(self.buckets.clone(), Arc::clone(&self.urls));
        let granules = GranuleReconciler::new(
            Arc::clone(&self.stores.catalog),
            Arc::clone(&self.stores.index),
            files,
            self.config.retry,
        );
        let aggregate = run_granule_chains(&granules, &collection_outcome.matched, request)
            .instrument(recon_span("granules", &report.name))
            .await?;

        let body = report
            .body
            .as_inventory_mut()
            .ok_or_else(|| ReconError::internal("inventory report with non-inventory body"))?;
        body.collections = collection_outcome.comparison;
        body.granules = aggregate.granules;
        body.access_urls = aggregate.files;
        Ok(())
    }

    /// Catalog-vs-index subset: collections and granules only.
    async fn generate_internal(
        &self,
        request: &NormalizedRequest,
        report: &mut ReconciliationReport,
    ) -> Result<()> {
        let collections = CollectionReconciler::new(
            Arc::clone(&self.stores.catalog),
            Arc::clone(&self.stores.index),
        );
        let collection_outcome = collections
            .reconcile(
                request.window.as_ref(),
                request.collections.as_deref(),
                request.mode,
            )
            .instrument(recon_span("collections", &report.name))
            .await?;

        let granules = GranuleReconciler::without_file_comparison(
            Arc::clone(&self.stores.catalog),
            Arc::clone(&self.stores.index),
            self.config.retry,
        );
        let aggregate = run_granule_chains(&granules, &collection_outcome.matched, request)
            .instrument(recon_span("granules", &report.name))
            .await?;

        let body = report
            .body
            .as_internal_mut()
            .ok_or_else(|| ReconError::internal("internal report with non-internal body"))?;
        body.collections = collection_outcome.comparison;
        body.granules = aggregate.granules;
        Ok(())
    }

    /// Runs every configured bucket through the bucket reconciler under the
    /// configured worker bound, preserving bucket order in the aggregate.
    async fn reconcile_buckets(&self) -> Result<StorageComparison> {
        let reconciler = BucketReconciler::new(
            Arc::clone(&self.stores.storage),
            Arc::clone(&self.stores.inventory),
            self.config.retry,
        );

        let runs = self.buckets.bucket_names().into_iter().map(|bucket| {
            let reconciler = reconciler.clone();
            async move { reconciler.reconcile(&bucket).await }
        });
        let comparisons: Vec<StorageComparison> = stream::iter(runs)
            .buffered(self.config.bucket_concurrency.max(1))
            .try_collect()
            .await?;

        let mut total = StorageComparison::default();
        for comparison in comparisons {
            total.absorb(comparison);
        }
        Ok(total)
    }

    async fn persist(&self, report: &ReconciliationReport) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(report).map_err(|err| ReconError::Serialization {
            message: err.to_string(),
        })?;
        self.stores
            .storage
            .put(&report.location, Bytes::from(bytes))
            .await?;
        Ok(())
    }
}

/// One concurrent task per matched collection; the `try_join_all` barrier is
/// the only point their outcomes are read, in matched-collection order.
async fn run_granule_chains(
    granules: &GranuleReconciler,
    matched: &[tern_core::CollectionId],
    request: &NormalizedRequest,
) -> Result<GranuleOutcome> {
    let chains = matched.iter().map(|collection| {
        let granules = granules.clone();
        let collection = collection.clone();
        let mode = request.mode;
        async move { granules.reconcile_collection(&collection, mode).await }
    });
    let outcomes = future::try_join_all(chains).await?;

    let mut aggregate = GranuleOutcome::default();
    for outcome in outcomes {
        aggregate.absorb(outcome);
    }
    Ok(aggregate)
}
