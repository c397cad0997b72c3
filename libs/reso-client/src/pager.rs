//! `@odata.nextLink` pagination as a `Stream`.
//!
//! A pager owns a page-fetching closure and asks it for the first page, then
//! for each `nextLink` the server hands back, until a page arrives without
//! one. [`RecordPager`] yields records, [`PagesPager`] whole pages.
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//!
//! let mut records = client.properties().filter(("City", "Seattle")).stream();
//! while let Some(record) = records.next().await {
//!     let record = record?;
//!     println!("{}", record["ListingKey"]);
//! }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use pin_project_lite::pin_project;
use serde_json::Value;

/// One decoded result page.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Absolute URL of the next page; `None` on the last page.
    pub next_link: Option<String>,
    /// `@odata.totalCount`, present when `$count=true` was requested.
    pub total_count: Option<u64>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, next_link: Option<String>) -> Self {
        Self {
            items,
            next_link,
            total_count: None,
        }
    }
}

impl Page<Value> {
    /// Read `value`, `@odata.nextLink` and `@odata.totalCount` from a
    /// response object. A missing or non-array `value` is an empty page; an
    /// empty `nextLink` ends pagination.
    #[must_use]
    pub fn from_json(body: &Value) -> Self {
        let items = body
            .get("value")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let next_link = body
            .get("@odata.nextLink")
            .and_then(Value::as_str)
            .filter(|link| !link.trim().is_empty())
            .map(str::to_owned);
        let total_count = body.get("@odata.totalCount").and_then(|count| {
            count
                .as_u64()
                .or_else(|| count.as_str().and_then(|s| s.trim().parse().ok()))
        });
        Self {
            items,
            next_link,
            total_count,
        }
    }
}

/// What the fetcher is asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageRequest {
    /// The query's own URL.
    First,
    /// A server-provided continuation link.
    Next(String),
}

pin_project! {
    /// Stream of records across all pages.
    ///
    /// Fetches lazily: the next page is requested only once the buffered
    /// records of the current one are consumed. The first error ends the
    /// stream.
    pub struct RecordPager<T, E, F, Fut>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        next: Option<PageRequest>,
        buffer: VecDeque<T>,
        fetcher: F,
        #[pin]
        current_fetch: Option<Fut>,
    }
}

impl<T, E, F, Fut> RecordPager<T, E, F, Fut>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    #[must_use]
    pub fn new(fetcher: F) -> Self {
        Self {
            next: Some(PageRequest::First),
            buffer: VecDeque::new(),
            fetcher,
            current_fetch: None,
        }
    }
}

impl<T, E, F, Fut> Stream for RecordPager<T, E, F, Fut>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(item) = this.buffer.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            if let Some(fut) = this.current_fetch.as_mut().as_pin_mut() {
                match fut.poll(cx) {
                    Poll::Ready(Ok(page)) => {
                        this.current_fetch.set(None);
                        *this.next = page.next_link.map(PageRequest::Next);
                        this.buffer.extend(page.items);
                        continue;
                    }
                    Poll::Ready(Err(e)) => {
                        this.current_fetch.set(None);
                        *this.next = None;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            let Some(request) = this.next.take() else {
                return Poll::Ready(None);
            };
            let fut = (this.fetcher)(request);
            this.current_fetch.set(Some(fut));
        }
    }
}

pin_project! {
    /// Stream of whole pages, for batch processing.
    pub struct PagesPager<T, E, F, Fut>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        next: Option<PageRequest>,
        fetcher: F,
        #[pin]
        current_fetch: Option<Fut>,
    }
}

impl<T, E, F, Fut> PagesPager<T, E, F, Fut>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    #[must_use]
    pub fn new(fetcher: F) -> Self {
        Self {
            next: Some(PageRequest::First),
            fetcher,
            current_fetch: None,
        }
    }
}

impl<T, E, F, Fut> Stream for PagesPager<T, E, F, Fut>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    type Item = Result<Page<T>, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(fut) = this.current_fetch.as_mut().as_pin_mut() {
                return match fut.poll(cx) {
                    Poll::Ready(Ok(page)) => {
                        this.current_fetch.set(None);
                        *this.next = page.next_link.clone().map(PageRequest::Next);
                        Poll::Ready(Some(Ok(page)))
                    }
                    Poll::Ready(Err(e)) => {
                        this.current_fetch.set(None);
                        *this.next = None;
                        Poll::Ready(Some(Err(e)))
                    }
                    Poll::Pending => Poll::Pending,
                };
            }

            let Some(request) = this.next.take() else {
                return Poll::Ready(None);
            };
            let fut = (this.fetcher)(request);
            this.current_fetch.set(Some(fut));
        }
    }
}
