//! # tern-recon
//!
//! Streaming drift reconciliation for the Tern platform.
//!
//! The engine answers "what exists in store A but not store B" across four
//! independently-maintained holdings of the same logical objects (object
//! storage, the internal inventory, the metadata catalog, and the search
//! index) at three nested granularities: stored objects, collections, and
//! granules with their published access URLs.
//!
//! Every comparison is a sorted merge-join over lazy cursors
//! ([`cursor::SortedCursor`]), so no store's holdings are ever materialized
//! in full: memory is bounded by one page per cursor plus, at the file
//! level, one granule's file set. [`orchestrator::ReportOrchestrator`]
//! composes the axes into a single persisted report with a
//! `Pending -> {Generated, Failed}` lifecycle.
//!
//! Stores are read at unsynchronized instants; a report is a best-effort
//! snapshot of drift, not a consistency proof, and the engine never writes
//! to the stores it compares.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod buckets;
pub mod collections;
pub mod cursor;
pub mod error;
pub mod files;
pub mod granules;
pub mod merge;
pub mod orchestrator;
pub mod params;
pub mod report;

pub use buckets::BucketReconciler;
pub use collections::{CollectionOutcome, CollectionReconciler};
pub use cursor::SortedCursor;
pub use error::{ReconError, Result};
pub use files::FileReconciler;
pub use granules::{GranuleOutcome, GranuleReconciler};
pub use merge::{CompareMode, MergeResult, merge_sorted};
pub use orchestrator::{OrchestratorConfig, ReconStores, ReportOrchestrator};
pub use params::{NormalizedRequest, ReportRequest};
pub use report::{
    AccessUrlComparison, CatalogUrlDrift, CollectionComparison, GranuleComparison, GranuleDrift,
    IndexFileDrift, InternalBody, InventoryBody, InventoryFileDrift, ReconciliationReport,
    ReportBody, ReportFailure, ReportType, StorageComparison,
};
