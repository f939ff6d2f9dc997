//! Internal inventory contract: the platform's own record of the files it
//! believes live in each storage bucket.
//!
//! The inventory is a relational/key-value system in production; the core
//! only needs its per-bucket file listing, sorted by object key, one page at
//! a time.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::page::{FetchError, Page, PageToken};

/// One file record held by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Bucket the file is recorded under.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
    /// Identifier of the granule this file belongs to.
    pub granule_id: String,
}

impl FileRecord {
    /// Creates a new file record.
    #[must_use]
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        granule_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            granule_id: granule_id.into(),
        }
    }

    /// Canonical `bucket/key` form used as the merge-join composite key.
    #[must_use]
    pub fn object_path(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

/// Inventory backend exposing per-bucket file listings.
#[async_trait]
pub trait Inventory: Send + Sync + 'static {
    /// Lists one page of the inventory's file records for `bucket`, ordered
    /// by object key.
    async fn list_files_page(
        &self,
        bucket: &str,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<FileRecord>, FetchError>;
}

/// In-memory inventory for tests.
#[derive(Debug)]
pub struct MemoryInventory {
    /// bucket -> key -> record
    records: RwLock<BTreeMap<String, BTreeMap<String, FileRecord>>>,
    page_size: usize,
}

impl Default for MemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInventory {
    /// Creates an empty inventory with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            page_size: 1000,
        }
    }

    /// Overrides the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Records a file.
    pub fn insert_file(&self, record: FileRecord) {
        if let Ok(mut records) = self.records.write() {
            records
                .entry(record.bucket.clone())
                .or_default()
                .insert(record.key.clone(), record);
        }
    }
}

#[async_trait]
impl Inventory for MemoryInventory {
    async fn list_files_page(
        &self,
        bucket: &str,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<FileRecord>, FetchError> {
        let records = self
            .records
            .read()
            .map_err(|_| FetchError::fatal("lock poisoned"))?;

        let Some(bucket_records) = records.get(bucket) else {
            return Ok(Page::last(Vec::new()));
        };

        let start = token.map_or(String::new(), |t| t.as_str().to_string());
        let mut items = Vec::new();
        for (key, record) in bucket_records.range(start..) {
            if token.is_some_and(|t| key == t.as_str()) {
                continue;
            }
            if items.len() == self.page_size {
                let last = items
                    .last()
                    .map(|r: &FileRecord| r.key.clone())
                    .unwrap_or_default();
                return Ok(Page::more(items, PageToken::new(last)));
            }
            items.push(record.clone());
        }

        Ok(Page::last(items))
    }
}
