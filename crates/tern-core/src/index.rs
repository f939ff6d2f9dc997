//! Search-index contract.
//!
//! The index is the platform's secondary, queryable view of collections and
//! granules. Unlike the catalog, its granule records carry the locally known
//! files, which is what file-level reconciliation compares access URLs
//! against.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{CollectionId, TimeWindow, paginate_by_id};
use crate::error::{Error, Result};
use crate::page::{FetchError, Page, PageToken};

/// One file attached to an index granule record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranuleFile {
    /// Bucket the file lives in.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
    /// Bare file name, as referenced from catalog URLs.
    pub file_name: String,
}

impl GranuleFile {
    /// Creates a granule file entry.
    #[must_use]
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            file_name: file_name.into(),
        }
    }

    /// Canonical `bucket/key` form.
    #[must_use]
    pub fn object_path(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

/// One granule as held by the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexGranule {
    /// Granule identifier, unique within the collection.
    pub granule_id: String,
    /// Owning collection.
    pub collection: CollectionId,
    /// Files the platform knows for this granule.
    pub files: Vec<GranuleFile>,
}

/// Search-index backend.
#[async_trait]
pub trait SearchIndex: Send + Sync + 'static {
    /// Returns the full collection-id list, sorted by composite id,
    /// optionally restricted to a time window.
    async fn collection_ids(&self, window: Option<&TimeWindow>) -> Result<Vec<CollectionId>>;

    /// Lists one page of a collection's granules, ordered by granule id.
    async fn granules_page(
        &self,
        collection: &CollectionId,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<IndexGranule>, FetchError>;
}

#[derive(Debug, Clone)]
struct CollectionEntry {
    id: CollectionId,
    updated_at: DateTime<Utc>,
}

/// In-memory index for tests.
#[derive(Debug)]
pub struct MemorySearchIndex {
    collections: RwLock<BTreeMap<String, CollectionEntry>>,
    granules: RwLock<BTreeMap<String, BTreeMap<String, IndexGranule>>>,
    page_size: usize,
}

impl Default for MemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySearchIndex {
    /// Creates an empty index with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            granules: RwLock::new(BTreeMap::new()),
            page_size: 1000,
        }
    }

    /// Overrides the granule listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Registers a collection with its last-update time.
    pub fn insert_collection(&self, id: CollectionId, updated_at: DateTime<Utc>) {
        if let Ok(mut collections) = self.collections.write() {
            collections.insert(id.composite(), CollectionEntry { id, updated_at });
        }
    }

    /// Registers a granule under its collection.
    pub fn insert_granule(&self, granule: IndexGranule) {
        if let Ok(mut granules) = self.granules.write() {
            granules
                .entry(granule.collection.composite())
                .or_default()
                .insert(granule.granule_id.clone(), granule);
        }
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn collection_ids(&self, window: Option<&TimeWindow>) -> Result<Vec<CollectionId>> {
        let collections = self.collections.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(collections
            .values()
            .filter(|entry| window.is_none_or(|w| w.contains(entry.updated_at)))
            .map(|entry| entry.id.clone())
            .collect())
    }

    async fn granules_page(
        &self,
        collection: &CollectionId,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<IndexGranule>, FetchError> {
        let granules = self
            .granules
            .read()
            .map_err(|_| FetchError::fatal("lock poisoned"))?;

        let Some(collection_granules) = granules.get(&collection.composite()) else {
            return Ok(Page::last(Vec::new()));
        };

        paginate_by_id(collection_granules, token, self.page_size, |g| {
            g.granule_id.clone()
        })
    }
}
