//! Bucket-level reconciliation: object storage vs the internal inventory.
//!
//! For one bucket, two cursors walk the raw storage listing and the
//! inventory's file records in parallel, both ordered by the canonical
//! `bucket/key` composite. The classic sorted merge-join classifies every
//! object exactly once, then drains whichever side has entries left.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tern_core::inventory::{FileRecord, Inventory};
use tern_core::page::{FetchError, Page, PageSource, PageToken, RetryConfig};
use tern_core::storage::{ObjectStore, StorageObject};

use crate::cursor::SortedCursor;
use crate::error::Result;
use crate::report::{InventoryFileDrift, StorageComparison};

/// Page source over one bucket's raw storage listing.
pub struct ObjectListingSource {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectListingSource {
    /// Creates a source listing `bucket` from its start.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl PageSource for ObjectListingSource {
    type Item = StorageObject;

    async fn fetch_page(
        &mut self,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<StorageObject>, FetchError> {
        self.store.list_page(&self.bucket, token).await
    }
}

/// Page source over one bucket's inventory file records.
pub struct InventoryFileSource {
    inventory: Arc<dyn Inventory>,
    bucket: String,
}

impl InventoryFileSource {
    /// Creates a source listing `bucket`'s records from the start.
    #[must_use]
    pub fn new(inventory: Arc<dyn Inventory>, bucket: impl Into<String>) -> Self {
        Self {
            inventory,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl PageSource for InventoryFileSource {
    type Item = FileRecord;

    async fn fetch_page(
        &mut self,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<FileRecord>, FetchError> {
        self.inventory.list_files_page(&self.bucket, token).await
    }
}

/// Which side(s) of the merge-join to consume next.
enum Advance {
    Storage,
    Inventory,
    Both,
}

/// Two-way merge-compare of one bucket's storage listing against its
/// inventory records.
#[derive(Clone)]
pub struct BucketReconciler {
    storage: Arc<dyn ObjectStore>,
    inventory: Arc<dyn Inventory>,
    retry: RetryConfig,
}

impl BucketReconciler {
    /// Creates a bucket reconciler; `retry` applies to both cursors.
    #[must_use]
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        inventory: Arc<dyn Inventory>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            storage,
            inventory,
            retry,
        }
    }

    /// Reconciles one bucket.
    ///
    /// # Errors
    ///
    /// Returns `ReconError::FetchAbort` if either listing fails beyond the
    /// retry policy.
    pub async fn reconcile(&self, bucket: &str) -> Result<StorageComparison> {
        let mut storage = SortedCursor::new(
            "storage",
            ObjectListingSource::new(Arc::clone(&self.storage), bucket),
        )
        .with_retry(self.retry);
        let mut inventory = SortedCursor::new(
            "inventory",
            InventoryFileSource::new(Arc::clone(&self.inventory), bucket),
        )
        .with_retry(self.retry);

        let mut comparison = StorageComparison::default();

        loop {
            let advance = match (storage.peek().await?, inventory.peek().await?) {
                (None, None) => break,
                (Some(_), None) => Advance::Storage,
                (None, Some(_)) => Advance::Inventory,
                (Some(object), Some(record)) => {
                    match object.object_path().cmp(&record.object_path()) {
                        Ordering::Less => Advance::Storage,
                        Ordering::Greater => Advance::Inventory,
                        Ordering::Equal => Advance::Both,
                    }
                }
            };

            match advance {
                Advance::Storage => {
                    if let Some(object) = storage.shift().await? {
                        comparison.only_in_storage.push(object.object_path());
                    }
                }
                Advance::Inventory => {
                    if let Some(record) = inventory.shift().await? {
                        comparison.only_in_inventory.push(InventoryFileDrift {
                            object_path: record.object_path(),
                            granule_id: record.granule_id,
                        });
                    }
                }
                Advance::Both => {
                    storage.shift().await?;
                    if let Some(record) = inventory.shift().await? {
                        comparison.ok_count += 1;
                        *comparison
                            .ok_count_by_granule
                            .entry(record.granule_id)
                            .or_default() += 1;
                    }
                }
            }
        }

        tracing::info!(
            bucket,
            ok = comparison.ok_count,
            only_in_storage = comparison.only_in_storage.len(),
            only_in_inventory = comparison.only_in_inventory.len(),
            "bucket reconciliation complete"
        );

        Ok(comparison)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_core::inventory::MemoryInventory;
    use tern_core::storage::MemoryObjectStore;

    fn stores() -> (Arc<MemoryObjectStore>, Arc<MemoryInventory>) {
        (
            Arc::new(MemoryObjectStore::new().with_page_size(2)),
            Arc::new(MemoryInventory::new().with_page_size(2)),
        )
    }

    #[tokio::test]
    async fn classifies_drift_on_both_sides() {
        let (storage, inventory) = stores();
        for key in ["a", "b", "d"] {
            storage.insert_object("data", key);
        }
        inventory.insert_file(FileRecord::new("data", "a", "g1"));
        inventory.insert_file(FileRecord::new("data", "c", "g1"));
        inventory.insert_file(FileRecord::new("data", "d", "g2"));

        let recon = BucketReconciler::new(storage, inventory, RetryConfig::default());
        let cmp = recon.reconcile("data").await.unwrap();

        assert_eq!(cmp.ok_count, 2);
        assert_eq!(cmp.only_in_storage, vec!["data/b"]);
        assert_eq!(cmp.only_in_inventory.len(), 1);
        assert_eq!(cmp.only_in_inventory[0].object_path, "data/c");
        assert_eq!(cmp.only_in_inventory[0].granule_id, "g1");
        assert_eq!(cmp.ok_count_by_granule["g1"], 1);
        assert_eq!(cmp.ok_count_by_granule["g2"], 1);
    }

    #[tokio::test]
    async fn drains_storage_tail_after_inventory_ends() {
        let (storage, inventory) = stores();
        for key in ["a", "b", "c", "d", "e"] {
            storage.insert_object("data", key);
        }
        inventory.insert_file(FileRecord::new("data", "a", "g1"));

        let recon = BucketReconciler::new(storage, inventory, RetryConfig::default());
        let cmp = recon.reconcile("data").await.unwrap();

        assert_eq!(cmp.ok_count, 1);
        assert_eq!(
            cmp.only_in_storage,
            vec!["data/b", "data/c", "data/d", "data/e"]
        );
    }

    #[tokio::test]
    async fn drains_inventory_tail_after_storage_ends() {
        let (storage, inventory) = stores();
        storage.insert_object("data", "a");
        for key in ["a", "b", "c"] {
            inventory.insert_file(FileRecord::new("data", key, "g1"));
        }

        let recon = BucketReconciler::new(storage, inventory, RetryConfig::default());
        let cmp = recon.reconcile("data").await.unwrap();

        assert_eq!(cmp.ok_count, 1);
        let paths: Vec<&str> = cmp
            .only_in_inventory
            .iter()
            .map(|d| d.object_path.as_str())
            .collect();
        assert_eq!(paths, vec!["data/b", "data/c"]);
    }

    #[tokio::test]
    async fn empty_bucket_on_both_sides_is_all_zero() {
        let (storage, inventory) = stores();
        let recon = BucketReconciler::new(storage, inventory, RetryConfig::default());
        let cmp = recon.reconcile("data").await.unwrap();
        assert_eq!(cmp, StorageComparison::default());
    }

    #[tokio::test]
    async fn page_boundaries_do_not_change_the_comparison() {
        let mut results = Vec::new();
        for page_size in [1, 2, 3, 1000] {
            let storage = Arc::new(MemoryObjectStore::new().with_page_size(page_size));
            let inventory = Arc::new(MemoryInventory::new().with_page_size(page_size));
            for key in ["a", "b", "c", "e", "g"] {
                storage.insert_object("data", key);
            }
            for key in ["b", "d", "e", "f"] {
                inventory.insert_file(FileRecord::new("data", key, "g1"));
            }
            let recon = BucketReconciler::new(storage, inventory, RetryConfig::default());
            results.push(recon.reconcile("data").await.unwrap());
        }
        for result in &results[1..] {
            assert_eq!(result, &results[0]);
        }
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let (storage, inventory) = stores();
        for key in ["a", "b", "c"] {
            storage.insert_object("data", key);
        }
        inventory.insert_file(FileRecord::new("data", "b", "g1"));

        let recon = BucketReconciler::new(storage, inventory, RetryConfig::default());
        let first = recon.reconcile("data").await.unwrap();
        let second = recon.reconcile("data").await.unwrap();
        assert_eq!(first, second);
    }
}
