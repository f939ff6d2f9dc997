//! Canonical report names and storage locations.
//!
//! This module is the single source of truth for report identity. The name
//! doubles as the tracking-record key and as the final path segment of the
//! persisted document, so both are derived here and nowhere else.

use chrono::{DateTime, Utc};

/// Path segment under the stack prefix where report documents live.
pub const REPORTS_SEGMENT: &str = "reconciliation-reports";

/// Builds a report name from its type label and request time:
/// `<camelCaseType>Report-<yyyymmddThhmmssmmm>`.
#[must_use]
pub fn report_name(report_type_label: &str, requested_at: DateTime<Utc>) -> String {
    format!(
        "{}Report-{}",
        camel_case(report_type_label),
        requested_at.format("%Y%m%dT%H%M%S%3f")
    )
}

/// Builds the storage location of a report document under a stack prefix.
#[must_use]
pub fn report_location(stack_prefix: &str, name: &str) -> String {
    let prefix = stack_prefix.trim_end_matches('/');
    format!("{prefix}/{REPORTS_SEGMENT}/{name}.json")
}

/// Lower-camel-cases a space-separated label: `Granule Not Found` becomes
/// `granuleNotFound`.
#[must_use]
pub fn camel_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for (i, word) in label.split_whitespace().enumerate() {
        let mut chars = word.chars();
        let Some(first) = chars.next() else { continue };
        if i == 0 {
            out.extend(first.to_lowercase());
        } else {
            out.extend(first.to_uppercase());
        }
        out.extend(chars.flat_map(char::to_lowercase));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn camel_cases_multi_word_labels() {
        assert_eq!(camel_case("Inventory"), "inventory");
        assert_eq!(camel_case("Granule Not Found"), "granuleNotFound");
        assert_eq!(camel_case("Internal"), "internal");
    }

    #[test]
    fn report_name_has_no_separators_in_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let name = report_name("Granule Not Found", at);
        assert_eq!(name, "granuleNotFoundReport-20260304T050607000");
    }

    #[test]
    fn report_location_is_stack_scoped() {
        assert_eq!(
            report_location("stacks/prod/", "inventoryReport-x"),
            "stacks/prod/reconciliation-reports/inventoryReport-x.json"
        );
    }
}
