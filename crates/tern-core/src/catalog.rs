//! Remote metadata-catalog contract.
//!
//! The catalog is the authoritative description of science collections and
//! granules, including the access URLs each granule is published under. The
//! core consumes two listings from it: the full (bounded) collection-id list,
//! and a sorted, paginated granule listing per collection.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::page::{FetchError, Page, PageToken};

/// Separator between a collection's short name and version in its
/// composite identifier.
pub const COMPOSITE_SEPARATOR: &str = "___";

/// Composite identifier for a collection: short name plus version.
///
/// Ordering is by the composite `name___version` string, which is the sort
/// order both the catalog and the index list collections in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionId {
    /// Collection short name.
    pub short_name: String,
    /// Collection version label.
    pub version: String,
}

impl CollectionId {
    /// Creates a collection id.
    #[must_use]
    pub fn new(short_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            version: version.into(),
        }
    }

    /// Canonical `name___version` form.
    #[must_use]
    pub fn composite(&self) -> String {
        format!(
            "{}{}{}",
            self.short_name, COMPOSITE_SEPARATOR, self.version
        )
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.short_name, COMPOSITE_SEPARATOR, self.version
        )
    }
}

impl Ord for CollectionId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.composite().cmp(&other.composite())
    }
}

impl PartialOrd for CollectionId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for CollectionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (short_name, version) = s.split_once(COMPOSITE_SEPARATOR).ok_or_else(|| {
            Error::InvalidInput(format!(
                "collection id '{s}' is not in name{COMPOSITE_SEPARATOR}version form"
            ))
        })?;
        if short_name.is_empty() || version.is_empty() {
            return Err(Error::InvalidInput(format!(
                "collection id '{s}' has an empty name or version"
            )));
        }
        Ok(Self::new(short_name, version))
    }
}

/// Inclusive time window used to scope collection queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Earliest update time to include, if bounded below.
    pub start: Option<DateTime<Utc>>,
    /// Latest update time to include, if bounded above.
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Creates a window; at least one bound is expected to be present.
    #[must_use]
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Returns true if `instant` falls inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| instant >= s) && self.end.is_none_or(|e| instant <= e)
    }
}

/// Role the catalog assigns to an access URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlRole {
    /// Direct data download.
    Download,
    /// Supporting documentation or ancillary data.
    RelatedInformation,
    /// Anything else (browse imagery, service endpoints, ...).
    Other,
}

/// One access-URL entry declared by the catalog for a granule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessUrl {
    /// The published URL.
    pub url: String,
    /// The role the catalog declares for it.
    pub role: UrlRole,
}

impl AccessUrl {
    /// Creates an access-URL entry.
    #[must_use]
    pub fn new(url: impl Into<String>, role: UrlRole) -> Self {
        Self {
            url: url.into(),
            role,
        }
    }
}

/// One granule as described by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogGranule {
    /// Granule identifier, unique within the collection.
    pub granule_id: String,
    /// Owning collection.
    pub collection: CollectionId,
    /// Access URLs the catalog publishes for this granule.
    pub urls: Vec<AccessUrl>,
}

/// Metadata-catalog backend.
#[async_trait]
pub trait MetadataCatalog: Send + Sync + 'static {
    /// Returns the full collection-id list, sorted by composite id.
    ///
    /// Collection counts are bounded, so this is a single materialized
    /// sequence rather than a paginated listing. A `window` restricts the
    /// result to collections updated inside it.
    async fn collection_ids(&self, window: Option<&TimeWindow>) -> Result<Vec<CollectionId>>;

    /// Lists one page of a collection's granules, ordered by granule id.
    async fn granules_page(
        &self,
        collection: &CollectionId,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<CatalogGranule>, FetchError>;
}

#[derive(Debug, Clone)]
struct CollectionEntry {
    id: CollectionId,
    updated_at: DateTime<Utc>,
}

/// In-memory catalog for tests.
#[derive(Debug)]
pub struct MemoryCatalog {
    collections: RwLock<BTreeMap<String, CollectionEntry>>,
    granules: RwLock<BTreeMap<String, BTreeMap<String, CatalogGranule>>>,
    page_size: usize,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Creates an empty catalog with the default page size.
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
    pub fn insert_granule(&self, granule: CatalogGranule) {
        if let Ok(mut granules) = self.granules.write() {
            granules
                .entry(granule.collection.composite())
                .or_default()
                .insert(granule.granule_id.clone(), granule);
        }
    }
}

#[async_trait]
impl MetadataCatalog for MemoryCatalog {
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
    ) -> std::result::Result<Page<CatalogGranule>, FetchError> {
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

/// Pages through a `BTreeMap` keyed by the value's own sort key, resuming
/// after the token. Shared by the memory catalog and index backends.
pub(crate) fn paginate_by_id<T: Clone>(
    map: &BTreeMap<String, T>,
    token: Option<&PageToken>,
    page_size: usize,
    id_of: impl Fn(&T) -> String,
) -> std::result::Result<Page<T>, FetchError> {
    let start = token.map_or(String::new(), |t| t.as_str().to_string());
    let mut items = Vec::new();
    for (id, value) in map.range(start..) {
        if token.is_some_and(|t| id == t.as_str()) {
            continue;
        }
        if items.len() == page_size {
            let last = items.last().map(&id_of).unwrap_or_default();
            return Ok(Page::more(items, PageToken::new(last)));
        }
        items.push(value.clone());
    }
    Ok(Page::last(items))
}
