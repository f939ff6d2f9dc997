//! Object-storage contract: sorted paginated bucket listing plus durable
//! blob writes for report documents.
//!
//! The reconciliation engine only requires two capabilities from object
//! storage: list one bucket's objects in key order, one page at a time, and
//! read/write small blobs by path. Real backends (S3, GCS) satisfy both; the
//! in-memory backend here exists for tests and local runs.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::page::{FetchError, Page, PageToken};

/// One object in a storage listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObject {
    /// Bucket the object lives in.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
}

impl StorageObject {
    /// Creates a new storage object reference.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Canonical `bucket/key` form used as the merge-join composite key.
    #[must_use]
    pub fn object_path(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

/// Object storage backend.
///
/// `list_page` must return objects in ascending key order within the bucket;
/// the listing order must be stable across pages of one traversal.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Lists one page of a bucket's objects, in key order.
    async fn list_page(
        &self,
        bucket: &str,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<StorageObject>, FetchError>;

    /// Reads a blob. Returns `Error::NotFound` if the path does not exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes a blob, replacing any existing content.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;
}

/// In-memory object store for tests.
///
/// Objects are held in a `BTreeMap` keyed by `bucket/key`, which gives the
/// lexicographic listing order the contract requires.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
    page_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// Creates an empty store with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: 1000,
        }
    }

    /// Overrides the listing page size (useful to exercise page boundaries).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Inserts an empty object at `bucket/key`.
    pub fn insert_object(&self, bucket: &str, key: &str) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(format!("{bucket}/{key}"), Bytes::new());
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<StorageObject>, FetchError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| FetchError::fatal("lock poisoned"))?;

        let prefix = format!("{bucket}/");
        let start = token.map_or_else(|| prefix.clone(), |t| t.as_str().to_string());

        let mut items = Vec::new();
        let mut last = None;
        for (path, _) in objects.range(start..) {
            if token.is_some_and(|t| path == t.as_str()) {
                // Token is the last path already returned; resume after it.
                continue;
            }
            if !path.starts_with(&prefix) {
                break;
            }
            if items.len() == self.page_size {
                return Ok(Page::more(
                    items,
                    PageToken::new(last.unwrap_or_else(|| prefix.clone())),
                ));
            }
            let key = path[prefix.len()..].to_string();
            items.push(StorageObject::new(bucket, key));
            last = Some(path.clone());
        }

        Ok(Page::last(items))
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        objects.insert(path.to_string(), data);
        Ok(())
    }
}
