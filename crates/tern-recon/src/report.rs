//! The reconciliation report document.
//!
//! A report is a single JSON-serializable document: identity and lifecycle
//! fields plus one comparison per axis. The set of axes is fixed per report
//! type, so the body is a closed tagged union rather than an open map.
//!
//! Lifecycle: a report is created `Pending` and persisted before any
//! comparison runs, mutated in place as each axis completes, and finalized
//! exactly once to `Generated` or `Failed`. The core never deletes a report.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tern_core::{ReportStatus, TrackingRecord};

use crate::error::{ReconError, Result};

/// The kind of reconciliation report being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    /// Full four-axis comparison of every store pair.
    Inventory,
    /// Catalog-vs-index collections and granules only.
    Internal,
    /// Inventory-shaped report restricted to locally-known holdings; always
    /// one-way.
    GranuleNotFound,
}

impl ReportType {
    /// The external label, as it appears in requests and documents.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Inventory => "Inventory",
            Self::Internal => "Internal",
            Self::GranuleNotFound => "Granule Not Found",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReportType {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Inventory" => Ok(Self::Inventory),
            "Internal" => Ok(Self::Internal),
            "Granule Not Found" => Ok(Self::GranuleNotFound),
            other => Err(ReconError::invalid_request(format!(
                "unknown report type '{other}'; expected one of: Inventory, Internal, Granule Not Found"
            ))),
        }
    }
}

/// Storage-vs-inventory comparison for the bucket axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageComparison {
    /// Objects present in both storage and inventory.
    pub ok_count: u64,
    /// Matched-object counts keyed by owning granule.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ok_count_by_granule: BTreeMap<String, u64>,
    /// Object paths present in storage but unknown to the inventory.
    pub only_in_storage: Vec<String>,
    /// Inventory records with no corresponding stored object.
    pub only_in_inventory: Vec<InventoryFileDrift>,
}

impl StorageComparison {
    /// Folds another bucket's comparison into this one.
    pub fn absorb(&mut self, other: Self) {
        self.ok_count += other.ok_count;
        for (granule, count) in other.ok_count_by_granule {
            *self.ok_count_by_granule.entry(granule).or_default() += count;
        }
        self.only_in_storage.extend(other.only_in_storage);
        self.only_in_inventory.extend(other.only_in_inventory);
    }
}

/// An inventory file record missing from object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryFileDrift {
    /// Canonical `bucket/key` of the missing object.
    pub object_path: String,
    /// Granule the inventory attributes the file to.
    pub granule_id: String,
}

/// Catalog-vs-index comparison of collection ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionComparison {
    /// Collections present in both stores.
    pub ok_count: u64,
    /// Composite ids known only to the catalog. Empty in one-way mode.
    pub only_in_catalog: Vec<String>,
    /// Composite ids known only to the index.
    pub only_in_index: Vec<String>,
}

/// Catalog-vs-index comparison of granules, aggregated over collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranuleComparison {
    /// Granules present in both stores.
    pub ok_count: u64,
    /// Granules known only to the catalog. Empty in one-way mode.
    pub only_in_catalog: Vec<GranuleDrift>,
    /// Granules known only to the index.
    pub only_in_index: Vec<GranuleDrift>,
}

impl GranuleComparison {
    /// Folds another collection's comparison into this one.
    pub fn absorb(&mut self, other: Self) {
        self.ok_count += other.ok_count;
        self.only_in_catalog.extend(other.only_in_catalog);
        self.only_in_index.extend(other.only_in_index);
    }
}

/// A granule present in one store only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranuleDrift {
    /// The granule identifier.
    pub granule_id: String,
    /// Composite id of the owning collection.
    pub collection_id: String,
}

/// Catalog-URL-vs-local-file comparison, aggregated over granules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessUrlComparison {
    /// Files accounted for on both sides (or legitimately private).
    pub ok_count: u64,
    /// Matched-file counts keyed by granule.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ok_count_by_granule: BTreeMap<String, u64>,
    /// Catalog download URLs with no matching local file.
    pub only_in_catalog: Vec<CatalogUrlDrift>,
    /// Local files the catalog should publish but does not.
    pub only_in_index: Vec<IndexFileDrift>,
}

impl AccessUrlComparison {
    /// Folds another granule's comparison into this one.
    pub fn absorb(&mut self, other: Self) {
        self.ok_count += other.ok_count;
        for (granule, count) in other.ok_count_by_granule {
            *self.ok_count_by_granule.entry(granule).or_default() += count;
        }
        self.only_in_catalog.extend(other.only_in_catalog);
        self.only_in_index.extend(other.only_in_index);
    }
}

/// A catalog URL entry that matched no local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogUrlDrift {
    /// Granule the URL was declared under.
    pub granule_id: String,
    /// File name referenced by the URL.
    pub file_name: String,
    /// The declared URL.
    pub url: String,
}

/// A local file the catalog does not reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFileDrift {
    /// Granule the file belongs to.
    pub granule_id: String,
    /// Bare file name.
    pub file_name: String,
    /// Canonical `bucket/key` of the file.
    pub object_path: String,
}

/// Axes of an inventory-shaped report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryBody {
    /// Storage-vs-inventory, per bucket.
    pub storage_files: StorageComparison,
    /// Catalog-vs-index collection ids.
    pub collections: CollectionComparison,
    /// Catalog-vs-index granules.
    pub granules: GranuleComparison,
    /// Catalog URLs vs locally known files.
    pub access_urls: AccessUrlComparison,
}

/// Axes of an internal report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalBody {
    /// Catalog-vs-index collection ids.
    pub collections: CollectionComparison,
    /// Catalog-vs-index granules.
    pub granules: GranuleComparison,
}

/// Closed union of report bodies, tagged by report type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reportType")]
pub enum ReportBody {
    /// Full four-axis report.
    Inventory(InventoryBody),
    /// Catalog-vs-index subset.
    Internal(InternalBody),
    /// Inventory-shaped, one-way report.
    #[serde(rename = "Granule Not Found")]
    GranuleNotFound(InventoryBody),
}

impl ReportBody {
    /// A zeroed body for the given report type; the shape persisted at the
    /// `Pending` checkpoint.
    #[must_use]
    pub fn empty(report_type: ReportType) -> Self {
        match report_type {
            ReportType::Inventory => Self::Inventory(InventoryBody::default()),
            ReportType::Internal => Self::Internal(InternalBody::default()),
            ReportType::GranuleNotFound => Self::GranuleNotFound(InventoryBody::default()),
        }
    }

    /// The report type this body belongs to.
    #[must_use]
    pub fn report_type(&self) -> ReportType {
        match self {
            Self::Inventory(_) => ReportType::Inventory,
            Self::Internal(_) => ReportType::Internal,
            Self::GranuleNotFound(_) => ReportType::GranuleNotFound,
        }
    }

    /// Mutable access to an inventory-shaped body, if this is one.
    pub fn as_inventory_mut(&mut self) -> Option<&mut InventoryBody> {
        match self {
            Self::Inventory(body) | Self::GranuleNotFound(body) => Some(body),
            Self::Internal(_) => None,
        }
    }

    /// Mutable access to an internal body, if this is one.
    pub fn as_internal_mut(&mut self) -> Option<&mut InternalBody> {
        match self {
            Self::Internal(body) => Some(body),
            _ => None,
        }
    }
}

/// Diagnostic summary recorded on a failed report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFailure {
    /// What the engine was doing when it failed.
    pub message: String,
    /// The underlying error.
    pub cause: String,
}

/// One reconciliation report document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// Report name; doubles as the tracking-record key.
    pub name: String,
    /// Lifecycle status.
    pub status: ReportStatus,
    /// Storage location of this document.
    pub location: String,
    /// When generation was requested.
    pub create_start_time: DateTime<Utc>,
    /// When generation reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_end_time: Option<DateTime<Utc>>,
    /// Failure diagnostics, present only on failed reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportFailure>,
    /// Per-axis comparisons.
    #[serde(flatten)]
    pub body: ReportBody,
}

impl ReconciliationReport {
    /// Creates a `Pending` report with a zeroed body; this is the state
    /// persisted as the crash-safety checkpoint before any comparison runs.
    #[must_use]
    pub fn pending(
        report_type: ReportType,
        name: impl Into<String>,
        location: impl Into<String>,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            status: ReportStatus::Pending,
            location: location.into(),
            create_start_time: requested_at,
            create_end_time: None,
            error: None,
            body: ReportBody::empty(report_type),
        }
    }

    /// The report's type, derived from its body.
    #[must_use]
    pub fn report_type(&self) -> ReportType {
        self.body.report_type()
    }

    /// Marks the report successfully generated.
    ///
    /// # Errors
    ///
    /// Returns `ReconError::InvalidTransition` if the report is not `Pending`.
    pub fn mark_generated(&mut self, ended_at: DateTime<Utc>) -> Result<()> {
        self.transition(ReportStatus::Generated)?;
        self.create_end_time = Some(ended_at);
        Ok(())
    }

    /// Marks the report failed with a diagnostic summary.
    ///
    /// # Errors
    ///
    /// Returns `ReconError::InvalidTransition` if the report is not `Pending`.
    pub fn mark_failed(&mut self, failure: ReportFailure, ended_at: DateTime<Utc>) -> Result<()> {
        self.transition(ReportStatus::Failed)?;
        self.create_end_time = Some(ended_at);
        self.error = Some(failure);
        Ok(())
    }

    /// The tracking record mirroring this report's current state.
    #[must_use]
    pub fn tracking_record(&self) -> TrackingRecord {
        TrackingRecord {
            name: self.name.clone(),
            report_type: self.report_type().label().to_string(),
            status: self.status,
            location: self.location.clone(),
            created_at: self.create_start_time,
            error: self.error.as_ref().map(|f| f.cause.clone()),
        }
    }

    fn transition(&mut self, to: ReportStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(ReconError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
