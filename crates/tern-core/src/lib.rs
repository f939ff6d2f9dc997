//! # tern-core
//!
//! Core abstractions for the Tern reconciliation platform.
//!
//! This crate defines the contracts the reconciliation engine depends on and
//! nothing else: every external store is reduced to the one capability the
//! engine needs from it, a **sorted, paginated listing**, plus durable
//! writes for report documents and tracking records.
//!
//! - **Pagination**: [`page::Page`], [`page::PageSource`], and the
//!   retryable-vs-fatal [`page::FetchError`] split
//! - **Stores**: object storage, inventory, metadata catalog, search index,
//!   and report tracking, each with an in-memory backend for tests
//! - **Policy inputs**: bucket visibility classes and access-URL construction
//! - **Identity**: report naming and storage locations
//! - **Error Types**: shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `tern-core` is the only crate allowed to define shared primitives. The
//! engine crate (`tern-recon`) consumes these contracts; it never talks to a
//! concrete backend type.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod buckets;
pub mod catalog;
pub mod error;
pub mod index;
pub mod inventory;
pub mod observability;
pub mod page;
pub mod paths;
pub mod storage;
pub mod tracking;
pub mod urls;

// Re-export key types at crate root for ergonomics
pub use buckets::{BucketMap, BucketVisibility};
pub use catalog::{
    AccessUrl, CatalogGranule, CollectionId, MemoryCatalog, MetadataCatalog, TimeWindow, UrlRole,
};
pub use error::{Error, Result};
pub use index::{GranuleFile, IndexGranule, MemorySearchIndex, SearchIndex};
pub use inventory::{FileRecord, Inventory, MemoryInventory};
pub use observability::{LogFormat, init_logging};
pub use page::{FetchError, Page, PageSource, PageToken, RetryConfig};
pub use storage::{MemoryObjectStore, ObjectStore, StorageObject};
pub use tracking::{MemoryReportTracker, ReportStatus, ReportTracker, TrackingRecord};
pub use urls::{AccessUrlPolicy, DistributionEndpoint};
