//! Tracking-record store for reconciliation reports.
//!
//! A tracking record is the small, queryable side of a report: identity,
//! status, and where the full document lives. It is created before any
//! comparison work starts and updated as the report moves through its
//! lifecycle, so a crashed run is never invisible.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle status of a reconciliation report.
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    /// Created and persisted; generation has not finished.
    Pending,
    /// Generation completed successfully.
    Generated,
    /// Generation failed; the record carries a diagnostic cause.
    Failed,
}

impl ReportStatus {
    /// Returns true if `self -> to` is a legal lifecycle transition.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(self, Self::Pending) && matches!(to, Self::Generated | Self::Failed)
    }

    /// Returns true if this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Generated => "Generated",
            Self::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// Tracking record for one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    /// Report name; the record key.
    pub name: String,
    /// Report type label (e.g. `Inventory`).
    pub report_type: String,
    /// Current lifecycle status.
    pub status: ReportStatus,
    /// Storage location of the full report document.
    pub location: String,
    /// When the report was requested.
    pub created_at: DateTime<Utc>,
    /// Diagnostic cause, present only for failed reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Store of tracking records, keyed by report name.
#[async_trait]
pub trait ReportTracker: Send + Sync + 'static {
    /// Creates a record. Fails with `Error::InvalidInput` if the name is
    /// already taken.
    async fn create(&self, record: TrackingRecord) -> Result<()>;

    /// Replaces the record with the same name. Fails with `Error::NotFound`
    /// if no such record exists.
    async fn update(&self, record: TrackingRecord) -> Result<()>;

    /// Looks up a record. Absence is a normal outcome, not an error.
    async fn get(&self, name: &str) -> Result<Option<TrackingRecord>>;
}

/// In-memory tracker for tests.
#[derive(Debug, Default)]
pub struct MemoryReportTracker {
    records: RwLock<HashMap<String, TrackingRecord>>,
}

impl MemoryReportTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportTracker for MemoryReportTracker {
    async fn create(&self, record: TrackingRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        if records.contains_key(&record.name) {
            return Err(Error::InvalidInput(format!(
                "tracking record already exists: {}",
                record.name
            )));
        }
        records.insert(record.name.clone(), record);
        Ok(())
    }

    async fn update(&self, record: TrackingRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        if !records.contains_key(&record.name) {
            return Err(Error::NotFound(format!(
                "tracking record not found: {}",
                record.name
            )));
        }
        records.insert(record.name.clone(), record);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<TrackingRecord>> {
        let records = self.records.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        Ok(records.get(name).cloned())
    }
}
