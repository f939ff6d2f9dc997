//! Bucket visibility classes.
//!
//! Visibility determines how reconciliation classifies a file the catalog
//! does not mention: private buckets are expected to be absent from the
//! catalog, so such files count as matched; protected and public buckets are
//! published, so absence is drift. The mapping is configuration the engine
//! consumes; it never produces or mutates it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Visibility class of one storage bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketVisibility {
    /// Never published; catalog absence is expected.
    Private,
    /// Published behind authenticated distribution.
    Protected,
    /// Published openly.
    Public,
}

impl BucketVisibility {
    /// Returns the lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Protected => "protected",
            Self::Public => "public",
        }
    }
}

/// Bucket-name to visibility lookup.
///
/// A bucket missing from the map resolves to `Private`: the catalog is
/// expected to omit it, so misconfiguration surfaces as missing drift rather
/// than false drift.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketMap {
    buckets: HashMap<String, BucketVisibility>,
}

impl BucketMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bucket with its visibility.
    #[must_use]
    pub fn with_bucket(mut self, name: impl Into<String>, visibility: BucketVisibility) -> Self {
        self.buckets.insert(name.into(), visibility);
        self
    }

    /// Looks up a bucket's visibility.
    #[must_use]
    pub fn visibility(&self, bucket: &str) -> BucketVisibility {
        self.buckets
            .get(bucket)
            .copied()
            .unwrap_or(BucketVisibility::Private)
    }

    /// Returns true if the bucket is private (including unknown buckets).
    #[must_use]
    pub fn is_private(&self, bucket: &str) -> bool {
        self.visibility(bucket) == BucketVisibility::Private
    }

    /// All configured bucket names, sorted; the orchestrator's enumeration
    /// order for bucket-level reconciliation.
    #[must_use]
    pub fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.keys().cloned().collect();
        names.sort();
        names
    }
}
