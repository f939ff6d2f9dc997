//! Lazy sorted cursor over a paginated listing source.
//!
//! [`SortedCursor`] is the engine's only view of an external listing: a
//! restartable-only-from-scratch sequence with `peek`/`shift` semantics.
//! It buffers exactly one fetched page (plus whatever the source returned in
//! excess of consumption) and never re-fetches a page already consumed, so a
//! merge-join over two cursors holds at most two pages in memory.
//!
//! Page fetches that fail transiently are retried according to the cursor's
//! [`RetryConfig`] with capped exponential backoff; exhausted retries and
//! fatal fetch errors escalate to [`ReconError::FetchAbort`], which is fatal
//! to the report.

use std::collections::VecDeque;

use tern_core::page::{FetchError, Page, PageSource, PageToken, RetryConfig};

use crate::error::{ReconError, Result};

enum CursorState {
    Start,
    Next(PageToken),
    Done,
}

/// Lazy, forward-only cursor over one sorted paginated source.
///
/// Items are yielded in the source's order; the sort-order contract is a
/// documented precondition of the merge-join consuming this cursor, not
/// something the cursor enforces.
pub struct SortedCursor<S: PageSource> {
    source: S,
    label: &'static str,
    buffer: VecDeque<S::Item>,
    state: CursorState,
    retry: RetryConfig,
}

impl<S: PageSource> SortedCursor<S> {
    /// Creates a cursor positioned at the start of the source.
    #[must_use]
    pub fn new(label: &'static str, source: S) -> Self {
        Self {
            source,
            label,
            buffer: VecDeque::new(),
            state: CursorState::Start,
            retry: RetryConfig::default(),
        }
    }

    /// Applies a retry policy to this cursor's page fetches.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the head item without consuming it. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `ReconError::FetchAbort` if a page fetch fails beyond the
    /// retry policy.
    pub async fn peek(&mut self) -> Result<Option<&S::Item>> {
        self.fill().await?;
        Ok(self.buffer.front())
    }

    /// Returns the head item and advances past it.
    ///
    /// # Errors
    ///
    /// Returns `ReconError::FetchAbort` if a page fetch fails beyond the
    /// retry policy.
    pub async fn shift(&mut self) -> Result<Option<S::Item>> {
        self.fill().await?;
        Ok(self.buffer.pop_front())
    }

    /// Fetches pages until the buffer is non-empty or the source completes.
    /// Empty pages with a continuation token are skipped transparently.
    async fn fill(&mut self) -> Result<()> {
        while self.buffer.is_empty() {
            let token = match &self.state {
                CursorState::Done => return Ok(()),
                CursorState::Start => None,
                CursorState::Next(token) => Some(token.clone()),
            };

            let page = self.fetch_with_retry(token.as_ref()).await?;
            self.state = match page.next {
                Some(next) => CursorState::Next(next),
                None => CursorState::Done,
            };
            self.buffer.extend(page.items);
        }
        Ok(())
    }

    async fn fetch_with_retry(&mut self, token: Option<&PageToken>) -> Result<Page<S::Item>> {
        let mut attempt: u32 = 0;
        loop {
            match self.source.fetch_page(token).await {
                Ok(page) => return Ok(page),
                Err(err @ FetchError::Fatal { .. }) => {
                    return Err(ReconError::FetchAbort {
                        message: err.to_string(),
                        attempts: attempt + 1,
                    });
                }
                Err(FetchError::Transient { message }) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(ReconError::FetchAbort {
                            message: format!("retries exhausted: {message}"),
                            attempts: attempt + 1,
                        });
                    }
                    let backoff = self.retry.backoff_for(attempt);
                    tracing::debug!(
                        cursor = self.label,
                        attempt,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        %message,
                        "transient fetch failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Source backed by a fixed sequence of fetch outcomes.
    struct ScriptedSource {
        fetches: VecDeque<std::result::Result<Page<u32>, FetchError>>,
        calls: u32,
    }

    impl ScriptedSource {
        fn new(fetches: Vec<std::result::Result<Page<u32>, FetchError>>) -> Self {
            Self {
                fetches: fetches.into(),
                calls: 0,
            }
        }

        /// Splits `items` into pages of `size`, tokens numbered per page.
        fn paged(items: &[u32], size: usize) -> Self {
            let chunks: Vec<&[u32]> = if items.is_empty() {
                vec![&[]]
            } else {
                items.chunks(size.max(1)).collect()
            };
            let last = chunks.len() - 1;
            let fetches = chunks
                .iter()
                .enumerate()
                .map(|(i, chunk)| {
                    Ok(if i == last {
                        Page::last(chunk.to_vec())
                    } else {
                        Page::more(chunk.to_vec(), PageToken::new(format!("p{i}")))
                    })
                })
                .collect();
            Self::new(fetches)
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        type Item = u32;

        async fn fetch_page(
            &mut self,
            _token: Option<&PageToken>,
        ) -> std::result::Result<Page<u32>, FetchError> {
            self.calls += 1;
            self.fetches
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::fatal("source exhausted")))
        }
    }

    async fn drain(cursor: &mut SortedCursor<ScriptedSource>) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(item) = cursor.shift().await.unwrap() {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn peek_is_idempotent_and_does_not_advance() {
        let mut cursor = SortedCursor::new("test", ScriptedSource::paged(&[1, 2], 10));
        assert_eq!(cursor.peek().await.unwrap(), Some(&1));
        assert_eq!(cursor.peek().await.unwrap(), Some(&1));
        assert_eq!(cursor.shift().await.unwrap(), Some(1));
        assert_eq!(cursor.peek().await.unwrap(), Some(&2));
    }

    #[tokio::test]
    async fn exhausted_cursor_stays_empty_forever() {
        let mut cursor = SortedCursor::new("test", ScriptedSource::paged(&[7], 10));
        assert_eq!(drain(&mut cursor).await, vec![7]);
        assert_eq!(cursor.peek().await.unwrap(), None);
        assert_eq!(cursor.shift().await.unwrap(), None);
        // One page, one fetch; completion never re-fetches.
        assert_eq!(cursor.source.calls, 1);
    }

    #[tokio::test]
    async fn page_boundaries_do_not_change_the_yielded_sequence() {
        let items = [1, 2, 3, 4, 5, 6, 7];
        for size in [1, 2, 3, 7, 100] {
            let mut cursor = SortedCursor::new("test", ScriptedSource::paged(&items, size));
            assert_eq!(drain(&mut cursor).await, items.to_vec(), "page size {size}");
        }
    }

    #[tokio::test]
    async fn empty_pages_with_tokens_are_skipped() {
        let fetches = vec![
            Ok(Page::more(vec![], PageToken::new("a"))),
            Ok(Page::more(vec![1], PageToken::new("b"))),
            Ok(Page::more(vec![], PageToken::new("c"))),
            Ok(Page::last(vec![2])),
        ];
        let mut cursor = SortedCursor::new("test", ScriptedSource::new(fetches));
        assert_eq!(drain(&mut cursor).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_when_configured() {
        let fetches = vec![
            Err(FetchError::transient("not consistent yet")),
            Ok(Page::last(vec![9])),
        ];
        let retry = RetryConfig {
            max_attempts: 2,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        let mut cursor = SortedCursor::new("test", ScriptedSource::new(fetches)).with_retry(retry);
        assert_eq!(cursor.shift().await.unwrap(), Some(9));
        assert_eq!(cursor.source.calls, 2);
    }

    #[tokio::test]
    async fn transient_failure_without_retries_aborts() {
        let fetches = vec![Err(FetchError::transient("lagging"))];
        let mut cursor = SortedCursor::new("test", ScriptedSource::new(fetches));
        let err = cursor.peek().await.unwrap_err();
        assert!(matches!(err, ReconError::FetchAbort { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn exhausted_retries_escalate_to_abort() {
        let fetches = vec![
            Err(FetchError::transient("a")),
            Err(FetchError::transient("b")),
            Err(FetchError::transient("c")),
        ];
        let retry = RetryConfig {
            max_attempts: 2,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        };
        let mut cursor = SortedCursor::new("test", ScriptedSource::new(fetches)).with_retry(retry);
        let err = cursor.shift().await.unwrap_err();
        assert!(matches!(err, ReconError::FetchAbort { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn fatal_failure_aborts_without_retrying() {
        let fetches = vec![Err(FetchError::fatal("no such bucket"))];
        let retry = RetryConfig::with_attempts(5);
        let mut cursor = SortedCursor::new("test", ScriptedSource::new(fetches)).with_retry(retry);
        let err = cursor.shift().await.unwrap_err();
        assert!(matches!(err, ReconError::FetchAbort { attempts: 1, .. }));
        assert_eq!(cursor.source.calls, 1);
    }
}
