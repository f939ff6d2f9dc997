//! File-level reconciliation for one matched granule.
//!
//! This axis compares the catalog's declared access URLs against the files
//! the platform knows locally. It is deliberately not a merge-join: the
//! catalog's URL list for one granule is small and unordered, so a
//! hash-lookup compare is the right shape.

use std::collections::BTreeMap;
use std::sync::Arc;

use tern_core::catalog::{CatalogGranule, UrlRole};
use tern_core::index::{GranuleFile, IndexGranule};
use tern_core::{AccessUrlPolicy, BucketMap};

use crate::report::{AccessUrlComparison, CatalogUrlDrift, IndexFileDrift};

/// Compares one granule's catalog URLs against its locally known files.
#[derive(Clone)]
pub struct FileReconciler {
    buckets: BucketMap,
    urls: Arc<dyn AccessUrlPolicy>,
}

impl std::fmt::Debug for FileReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReconciler")
            .field("buckets", &self.buckets)
            .finish_non_exhaustive()
    }
}

impl FileReconciler {
    /// Creates a file reconciler over the given visibility map and URL
    /// construction policy.
    #[must_use]
    pub fn new(buckets: BucketMap, urls: Arc<dyn AccessUrlPolicy>) -> Self {
        Self { buckets, urls }
    }

    /// Reconciles one matched granule pair.
    ///
    /// Every local file and every download/related-information URL entry is
    /// accounted for: matched against the other side, accepted as a private
    /// absence, or recorded as drift.
    #[must_use]
    pub fn reconcile_granule(
        &self,
        catalog: &CatalogGranule,
        local: &IndexGranule,
    ) -> AccessUrlComparison {
        // BTreeMap so leftover files are reported in a stable order.
        let mut remaining: BTreeMap<&str, &GranuleFile> = local
            .files
            .iter()
            .map(|f| (f.file_name.as_str(), f))
            .collect();

        let mut comparison = AccessUrlComparison::default();
        let mut granule_ok: u64 = 0;

        for entry in &catalog.urls {
            if !matches!(entry.role, UrlRole::Download | UrlRole::RelatedInformation) {
                continue;
            }

            let file_name = file_name_from_url(&entry.url);
            let known = file_name
                .as_deref()
                .and_then(|name| remaining.get(name).copied());

            match known {
                Some(file) if !self.buckets.is_private(&file.bucket) => {
                    let hosted = self.urls.distribution_url(&file.bucket, &file.key);
                    let direct = self.urls.direct_url(&file.bucket, &file.key);
                    if entry.url == hosted || entry.url == direct {
                        comparison.ok_count += 1;
                        granule_ok += 1;
                        if let Some(name) = file_name.as_deref() {
                            remaining.remove(name);
                        }
                    } else if entry.role == UrlRole::Download {
                        comparison.only_in_catalog.push(CatalogUrlDrift {
                            granule_id: catalog.granule_id.clone(),
                            file_name: file_name.clone().unwrap_or_default(),
                            url: entry.url.clone(),
                        });
                    }
                }
                // Private files are expected to be unpublished; a download
                // URL pointing at one is catalog drift, same as no file.
                _ => {
                    if entry.role == UrlRole::Download {
                        comparison.only_in_catalog.push(CatalogUrlDrift {
                            granule_id: catalog.granule_id.clone(),
                            file_name: file_name.clone().unwrap_or_default(),
                            url: entry.url.clone(),
                        });
                    }
                }
            }
        }

        for file in remaining.values() {
            if self.buckets.is_private(&file.bucket) {
                comparison.ok_count += 1;
                granule_ok += 1;
            } else {
                comparison.only_in_index.push(IndexFileDrift {
                    granule_id: local.granule_id.clone(),
                    file_name: file.file_name.clone(),
                    object_path: file.object_path(),
                });
            }
        }

        comparison
            .ok_count_by_granule
            .insert(local.granule_id.clone(), granule_ok);
        comparison
    }
}

/// Extracts the file name a URL references: the last path segment, with any
/// query or fragment stripped.
fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
