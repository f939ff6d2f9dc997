//! Pagination contract shared by every listing collaborator.
//!
//! Each external store (object storage, inventory, catalog, index) exposes its
//! holdings as sorted pages behind a [`PageSource`]. The reconciliation engine
//! never sees more than one page of any source at a time.
//!
//! Page fetches fail in one of two ways, and the distinction is part of the
//! contract rather than an exception hierarchy:
//!
//! - [`FetchError::Transient`]: the store is temporarily inconsistent or
//!   unavailable (read-after-write lag, throttling). Worth retrying.
//! - [`FetchError::Fatal`]: the fetch cannot succeed by retrying.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque continuation token handed back by a listing source.
///
/// Tokens are only meaningful to the source that produced them. The cursor
/// treats them as a black box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken(String);

impl PageToken {
    /// Wraps a raw token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a sorted listing.
///
/// An empty `items` with a `next` token is legal; the consumer keeps fetching.
/// `next: None` means the listing is complete.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items in this page, in the source's sort order.
    pub items: Vec<T>,
    /// Continuation token for the next page, if more pages exist.
    pub next: Option<PageToken>,
}

impl<T> Page<T> {
    /// Builds the final page of a listing.
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    /// Builds an intermediate page with a continuation token.
    #[must_use]
    pub fn more(items: Vec<T>, next: PageToken) -> Self {
        Self {
            items,
            next: Some(next),
        }
    }
}

/// Failure of a single page fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The store is temporarily unable to serve the page; retrying may help.
    #[error("transient fetch failure: {message}")]
    Transient {
        /// Description of the transient condition.
        message: String,
    },

    /// The fetch cannot succeed; the listing must be abandoned.
    #[error("fetch failed: {message}")]
    Fatal {
        /// Description of the failure.
        message: String,
    },
}

impl FetchError {
    /// Creates a transient (retryable) fetch error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a fatal (non-retryable) fetch error.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Returns true if retrying the fetch may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// A sorted, paginated listing source.
///
/// Implementations must yield items in non-decreasing order under the
/// comparator of whichever merge-join consumes them. That ordering is a
/// documented precondition of the engine, not something the source or the
/// cursor enforces per item.
#[async_trait]
pub trait PageSource: Send {
    /// The item type this source yields.
    type Item: Send;

    /// Fetches one page. `token` is `None` for the first page, otherwise the
    /// continuation token from the previous page.
    async fn fetch_page(
        &mut self,
        token: Option<&PageToken>,
    ) -> std::result::Result<Page<Self::Item>, FetchError>;
}

/// Retry policy applied at the page-fetch boundary.
///
/// Defaults to no retries; sources that are known to exhibit read-after-write
/// lag opt in explicitly. Backoff doubles per attempt from `min_backoff`,
/// capped at `max_backoff`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial fetch.
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub min_backoff: Duration,
    /// Upper bound on any single backoff.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            min_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// A policy that retries `max_attempts` times with default backoff bounds.
    #[must_use]
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Returns the backoff to sleep before retry number `attempt` (0-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.min_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}
