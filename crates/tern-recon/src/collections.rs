//! Collection-level reconciliation: catalog vs index.
//!
//! Collection counts are bounded, so both sides are materialized as full
//! sorted id lists and compared in memory with the same merge-join the
//! streaming axes use. Only matched collections feed granule-level
//! reconciliation; mismatches are reported and never recursed into.

use std::sync::Arc;

use tern_core::catalog::{CollectionId, MetadataCatalog, TimeWindow};
use tern_core::index::SearchIndex;

use crate::error::Result;
use crate::merge::{CompareMode, merge_sorted};
use crate::report::CollectionComparison;

/// Result of the collection axis: the reportable comparison plus the matched
/// ids that granule reconciliation recurses into.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    /// The comparison as it appears in the report.
    pub comparison: CollectionComparison,
    /// Collections present in both stores, in composite-id order.
    pub matched: Vec<CollectionId>,
}

/// Compares the catalog's collection list against the index's.
#[derive(Clone)]
pub struct CollectionReconciler {
    catalog: Arc<dyn MetadataCatalog>,
    index: Arc<dyn SearchIndex>,
}

impl CollectionReconciler {
    /// Creates a collection reconciler.
    #[must_use]
    pub fn new(catalog: Arc<dyn MetadataCatalog>, index: Arc<dyn SearchIndex>) -> Self {
        Self { catalog, index }
    }

    /// Runs the collection comparison.
    ///
    /// `filter`, when present, restricts both sides to the listed ids.
    /// Under one-way mode, ids exclusive to the catalog are never reported.
    ///
    /// # Errors
    ///
    /// Returns an error if either store's collection listing fails; the
    /// failure is fatal to the report.
    pub async fn reconcile(
        &self,
        window: Option<&TimeWindow>,
        filter: Option<&[CollectionId]>,
        mode: CompareMode,
    ) -> Result<CollectionOutcome> {
        let mut catalog_ids = self.catalog.collection_ids(window).await?;
        let mut index_ids = self.index.collection_ids(window).await?;

        if let Some(wanted) = filter {
            catalog_ids.retain(|id| wanted.contains(id));
            index_ids.retain(|id| wanted.contains(id));
        }

        let result = merge_sorted(catalog_ids, index_ids, mode);

        let comparison = CollectionComparison {
            ok_count: result.matched.len() as u64,
            only_in_catalog: result
                .only_left
                .iter()
                .map(CollectionId::composite)
                .collect(),
            only_in_index: result
                .only_right
                .iter()
                .map(CollectionId::composite)
                .collect(),
        };

        tracing::info!(
            ok = comparison.ok_count,
            only_in_catalog = comparison.only_in_catalog.len(),
            only_in_index = comparison.only_in_index.len(),
            one_way = mode.is_one_way(),
            "collection reconciliation complete"
        );

        Ok(CollectionOutcome {
            comparison,
            matched: result.matched,
        })
    }
}
