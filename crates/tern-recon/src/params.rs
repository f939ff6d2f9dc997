//! Report request parameters and their normalization.
//!
//! Requests arrive loosely typed (free-form timestamps, a singular or plural
//! collection filter). Normalization happens once, up front; any input error
//! rejects the request before a tracking record or report document exists.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use tern_core::catalog::{CollectionId, TimeWindow};

use crate::error::{ReconError, Result};
use crate::merge::CompareMode;
use crate::report::ReportType;

/// Raw report request, as received from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    /// Report type label; defaults to `Inventory`.
    pub report_type: Option<String>,
    /// Start of the time window, free-form date-like input.
    pub start_timestamp: Option<String>,
    /// End of the time window, free-form date-like input.
    pub end_timestamp: Option<String>,
    /// Single collection filter. Mutually exclusive with `collection_ids`.
    pub collection_id: Option<String>,
    /// Plural collection filter. Mutually exclusive with `collection_id`.
    pub collection_ids: Option<Vec<String>>,
    /// Explicit one-way override. When absent, one-way is inferred from the
    /// presence of a time window.
    pub one_way: Option<bool>,
}

/// A validated, fully typed request.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    /// The report type to generate.
    pub report_type: ReportType,
    /// Time window restricting collection queries, if any.
    pub window: Option<TimeWindow>,
    /// Collection filter, sorted, if any.
    pub collections: Option<Vec<CollectionId>>,
    /// Resolved comparison mode.
    pub mode: CompareMode,
}

impl ReportRequest {
    /// Validates and normalizes the request.
    ///
    /// # Errors
    ///
    /// Returns `ReconError::InvalidRequest` for an unknown report type, an
    /// unparsable timestamp, a malformed collection id, or when both the
    /// singular and plural collection filters are supplied.
    pub fn normalize(self) -> Result<NormalizedRequest> {
        let report_type = match self.report_type.as_deref() {
            Some(label) => label.parse()?,
            None => ReportType::Inventory,
        };

        if self.collection_id.is_some() && self.collection_ids.is_some() {
            return Err(ReconError::invalid_request(
                "collectionId and collectionIds are mutually exclusive",
            ));
        }

        // The conflicting combination was rejected above.
        let raw_ids = match (self.collection_id, self.collection_ids) {
            (Some(single), _) => Some(vec![single]),
            (None, many) => many,
        };
        let collections = match raw_ids {
            Some(raw) => {
                let mut ids = raw
                    .iter()
                    .map(|s| s.parse::<CollectionId>().map_err(ReconError::from))
                    .collect::<Result<Vec<_>>>()?;
                ids.sort();
                Some(ids)
            }
            None => None,
        };

        let start = self
            .start_timestamp
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let end = self
            .end_timestamp
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let window = if start.is_none() && end.is_none() {
            None
        } else {
            Some(TimeWindow::new(start, end))
        };

        let mode = if report_type == ReportType::GranuleNotFound {
            CompareMode::OneWay
        } else {
            match self.one_way {
                Some(true) => CompareMode::OneWay,
                Some(false) => CompareMode::TwoWay,
                None if window.is_some() => CompareMode::OneWay,
                None => CompareMode::TwoWay,
            }
        };

        Ok(NormalizedRequest {
            report_type,
            window,
            collections,
            mode,
        })
    }
}

/// Parses a free-form date-like input to UTC.
///
/// Accepted forms, tried in order: RFC 3339, `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DD` (midnight), and integer epoch milliseconds.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    if let Ok(millis) = trimmed.parse::<i64>() {
        if let Some(parsed) = Utc.timestamp_millis_opt(millis).single() {
            return Ok(parsed);
        }
    }

    Err(ReconError::invalid_request(format!(
        "unparsable timestamp '{raw}'"
    )))
}
