//! Granule-level reconciliation for one matched collection.
//!
//! Catalog and index granules are walked by two cursors ordered by granule
//! id and merge-joined. When a granule matches on both sides, its files are
//! reconciled inline, before the cursors advance, so peak memory is bounded
//! by a single granule's file set regardless of collection size.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tern_core::catalog::{CatalogGranule, CollectionId, MetadataCatalog};
use tern_core::index::{IndexGranule, SearchIndex};
use tern_core::page::{FetchError, Page, PageSource, PageToken, RetryConfig};

use crate::cursor::SortedCursor;
use crate::error::Result;
use crate::files::FileReconciler;
use crate::merge::CompareMode;
use crate::report::{AccessUrlComparison, GranuleComparison, GranuleDrift};

/// Page source over one collection's catalog granules.
pub struct CatalogGranuleSource {
    catalog: Arc<dyn MetadataCatalog>,
    collection: CollectionId,
}

#[async_trait]
impl PageSource for CatalogGranuleSource {
    type Item = CatalogGranule;

    async fn fetch_page(
        &mut self,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<CatalogGranule>, FetchError> {
        self.catalog.granules_page(&self.collection, token).await
    }
}

/// Page source over one collection's index granules.
pub struct IndexGranuleSource {
    index: Arc<dyn SearchIndex>,
    collection: CollectionId,
}

#[async_trait]
impl PageSource for IndexGranuleSource {
    type Item = IndexGranule;

    async fn fetch_page(
        &mut self,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<IndexGranule>, FetchError> {
        self.index.granules_page(&self.collection, token).await
    }
}

enum Advance {
    Catalog,
    Index,
    Both,
}

/// Result of one collection's granule axis: the granule comparison plus the
/// file-level comparison accumulated over its matched granules.
#[derive(Debug, Clone, Default)]
pub struct GranuleOutcome {
    /// Granule-level comparison.
    pub granules: GranuleComparison,
    /// File-level comparison, folded over every matched granule.
    pub files: AccessUrlComparison,
}

impl GranuleOutcome {
    /// Folds another collection's outcome into this one.
    pub fn absorb(&mut self, other: Self) {
        self.granules.absorb(other.granules);
        self.files.absorb(other.files);
    }
}

/// Merge-compares catalog granules against index granules for matched
/// collections, recursing into file reconciliation per matched granule.
#[derive(Clone)]
pub struct GranuleReconciler {
    catalog: Arc<dyn MetadataCatalog>,
    index: Arc<dyn SearchIndex>,
    files: Option<FileReconciler>,
    retry: RetryConfig,
}

impl GranuleReconciler {
    /// Creates a granule reconciler that also reconciles files of matched
    /// granules.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn MetadataCatalog>,
        index: Arc<dyn SearchIndex>,
        files: FileReconciler,
        retry: RetryConfig,
    ) -> Self {
        Self {
            catalog,
            index,
            files: Some(files),
            retry,
        }
    }

    /// Creates a granule reconciler that compares granule ids only, leaving
    /// the file axis untouched (used by internal reports).
    #[must_use]
    pub fn without_file_comparison(
        catalog: Arc<dyn MetadataCatalog>,
        index: Arc<dyn SearchIndex>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            catalog,
            index,
            files: None,
            retry,
        }
    }

    /// Reconciles one matched collection's granules.
    ///
    /// Under one-way mode, granules exclusive to the catalog are skipped:
    /// they are neither reported nor file-reconciled, since no index-side
    /// record exists to compare against.
    ///
    /// # Errors
    ///
    /// Returns `ReconError::FetchAbort` if either granule listing fails
    /// beyond the retry policy.
    pub async fn reconcile_collection(
        &self,
        collection: &CollectionId,
        mode: CompareMode,
    ) -> Result<GranuleOutcome> {
        let mut catalog = SortedCursor::new(
            "catalog-granules",
            CatalogGranuleSource {
                catalog: Arc::clone(&self.catalog),
                collection: collection.clone(),
            },
        )
        .with_retry(self.retry);
        let mut index = SortedCursor::new(
            "index-granules",
            IndexGranuleSource {
                index: Arc::clone(&self.index),
                collection: collection.clone(),
            },
        )
        .with_retry(self.retry);

        let mut outcome = GranuleOutcome::default();

        loop {
            let advance = match (catalog.peek().await?, index.peek().await?) {
                (None, None) => break,
                (Some(_), None) => Advance::Catalog,
                (None, Some(_)) => Advance::Index,
                (Some(c), Some(i)) => match c.granule_id.cmp(&i.granule_id) {
                    Ordering::Less => Advance::Catalog,
                    Ordering::Greater => Advance::Index,
                    Ordering::Equal => Advance::Both,
                },
            };

            match advance {
                Advance::Catalog => {
                    if let Some(granule) = catalog.shift().await? {
                        if !mode.is_one_way() {
                            outcome.granules.only_in_catalog.push(GranuleDrift {
                                granule_id: granule.granule_id,
                                collection_id: collection.composite(),
                            });
                        }
                    }
                }
                Advance::Index => {
                    if let Some(granule) = index.shift().await? {
                        outcome.granules.only_in_index.push(GranuleDrift {
                            granule_id: granule.granule_id,
                            collection_id: collection.composite(),
                        });
                    }
                }
                Advance::Both => {
                    let catalog_granule = catalog.shift().await?;
                    let index_granule = index.shift().await?;
                    if let (Some(remote), Some(local)) = (catalog_granule, index_granule) {
                        outcome.granules.ok_count += 1;
                        if let Some(files) = &self.files {
                            outcome.files.absorb(files.reconcile_granule(&remote, &local));
                        }
                    }
                }
            }
        }

        tracing::debug!(
            collection = %collection,
            ok = outcome.granules.ok_count,
            only_in_catalog = outcome.granules.only_in_catalog.len(),
            only_in_index = outcome.granules.only_in_index.len(),
            file_ok = outcome.files.ok_count,
            "granule reconciliation complete"
        );

        Ok(outcome)
    }
}
