// # Follower Listing Provider Trait
//
// Defines the interface for reading an account's follower count and its
// paginated follower list.
//
// ## Implementations
//
// - HTTP gateway: `postsched-provider-http` crate
//
// ## Usage
//
// ```rust,ignore
// use futures::TryStreamExt;
// use postsched_core::traits::follower_pages;
//
// let total = source.total_count("acme").await?;
// let mut pages = follower_pages(&*source, "acme");
// while let Some(ids) = pages.try_next().await? {
//     println!("{} followers on this page", ids.len());
// }
// ```

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::collections::HashSet;

/// One page of follower identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowerPage {
    /// Follower identifiers on this page
    pub ids: Vec<String>,
    /// Cursor for the next page, `None` on the last page
    pub next_cursor: Option<String>,
}

/// Trait for follower listing implementations
///
/// # Trust Level: Untrusted
///
/// Like publishing providers, listing sources make one remote call per method
/// invocation. They never retry and never cache; a failed call aborts the
/// tracker's current reconciliation cycle.
#[async_trait]
pub trait FollowerListingProvider: Send + Sync {
    /// Platform-reported total follower count for `account`
    async fn total_count(&self, account: &str) -> Result<u64, crate::Error>;

    /// Fetch one page of follower identifiers
    ///
    /// # Parameters
    ///
    /// - `account`: The observed account
    /// - `cursor`: `None` for the first page, otherwise the previous page's cursor
    async fn list_page(
        &self,
        account: &str,
        cursor: Option<&str>,
    ) -> Result<FollowerPage, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing listing providers from configuration
pub trait FollowerListingProviderFactory: Send + Sync {
    /// Create a FollowerListingProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn FollowerListingProvider>, crate::Error>;
}

/// Lazily walk every follower page of `account`
///
/// Nothing is fetched until the stream is polled; each poll fetches exactly
/// one page. The stream ends after the page without a cursor and stops at the
/// first error. A cursor handed out twice is an error, so a source that
/// cycles through its pages cannot keep the walk going forever.
pub fn follower_pages<'a>(
    source: &'a dyn FollowerListingProvider,
    account: &'a str,
) -> BoxStream<'a, Result<Vec<String>, crate::Error>> {
    stream::try_unfold(PageWalk::default(), move |mut walk| async move {
        let Some(cursor) = walk.next.take() else {
            return Ok::<_, crate::Error>(None);
        };

        let page = source.list_page(account, cursor.as_deref()).await?;

        if let Some(next) = page.next_cursor.filter(|next| !next.is_empty()) {
            if !walk.seen.insert(next.clone()) {
                return Err(crate::Error::listing(
                    source.source_name(),
                    format!("Cursor '{}' repeated while listing {}", next, account),
                ));
            }
            walk.next = Some(Some(next));
        }

        Ok(Some((page.ids, walk)))
    })
    .boxed()
}

/// Pagination state of [`follower_pages`]
struct PageWalk {
    // None = exhausted, Some(None) = first page, Some(Some(c)) = page at cursor c
    next: Option<Option<String>>,
    seen: HashSet<String>,
}

impl Default for PageWalk {
    fn default() -> Self {
        Self {
            next: Some(None),
            seen: HashSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PagedSource {
        pages: Vec<Vec<&'static str>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FollowerListingProvider for PagedSource {
        async fn total_count(&self, _account: &str) -> Result<u64, crate::Error> {
            Ok(self.pages.iter().map(|p| p.len() as u64).sum())
        }

        async fn list_page(
            &self,
            _account: &str,
            cursor: Option<&str>,
        ) -> Result<FollowerPage, crate::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let index: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let next_cursor = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(FollowerPage {
                ids: self.pages[index].iter().map(|s| s.to_string()).collect(),
                next_cursor,
            })
        }

        fn source_name(&self) -> &'static str {
            "paged"
        }
    }

    #[tokio::test]
    async fn walks_every_page_in_order() {
        let source = PagedSource {
            pages: vec![vec!["a", "b"], vec!["c"], vec!["d", "e"]],
            calls: AtomicUsize::new(0),
        };

        let pages: Vec<Vec<String>> = follower_pages(&source, "acme").try_collect().await.unwrap();

        assert_eq!(pages.concat(), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fetches_nothing_until_polled() {
        let source = PagedSource {
            pages: vec![vec!["a"]],
            calls: AtomicUsize::new(0),
        };

        let pages = follower_pages(&source, "acme");
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        drop(pages);
    }

    /// Hands out cursors from a fixed `cursor -> next` table
    struct CursorTable {
        links: Vec<(Option<&'static str>, &'static str)>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FollowerListingProvider for CursorTable {
        async fn total_count(&self, _account: &str) -> Result<u64, crate::Error> {
            Ok(0)
        }

        async fn list_page(
            &self,
            _account: &str,
            cursor: Option<&str>,
        ) -> Result<FollowerPage, crate::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next_cursor = self
                .links
                .iter()
                .find(|(from, _)| *from == cursor)
                .map(|(_, to)| to.to_string());
            Ok(FollowerPage {
                ids: vec![format!("from-{}", cursor.unwrap_or("start"))],
                next_cursor,
            })
        }

        fn source_name(&self) -> &'static str {
            "table"
        }
    }

    #[tokio::test]
    async fn cursor_cycle_ends_with_an_error() {
        // start -> A -> B -> A
        let source = CursorTable {
            links: vec![(None, "A"), (Some("A"), "B"), (Some("B"), "A")],
            calls: AtomicUsize::new(0),
        };

        let result: Result<Vec<Vec<String>>, _> =
            follower_pages(&source, "acme").try_collect().await;

        assert!(matches!(result, Err(crate::Error::ListingProvider { .. })));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn self_referencing_cursor_ends_with_an_error() {
        let source = CursorTable {
            links: vec![(None, "A"), (Some("A"), "A")],
            calls: AtomicUsize::new(0),
        };

        let result: Result<Vec<Vec<String>>, _> =
            follower_pages(&source, "acme").try_collect().await;

        assert!(result.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
