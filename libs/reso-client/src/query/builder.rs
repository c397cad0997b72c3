use std::future::Future;
use std::pin::Pin;

use futures_core::Stream;
use reso_odata::{ConditionError, Conditions, OrderClause, parse, quote, render_order};
use serde_json::Value;

use super::{ODataParams, WhereChain};
use crate::client::ResoClient;
use crate::error::ClientError;
use crate::executor::{Payload, decode_url};
use crate::pager::{Page, PageRequest, PagesPager, RecordPager};
use crate::resources::Resource;

/// Filter added to property queries that say nothing about status.
pub const DEFAULT_PROPERTIES_SCOPE: &str = "StandardStatus in ('Active','Pending')";

/// Page size used by [`QueryBuilder::find_each`] callers that have no
/// preference.
pub const DEFAULT_FIND_EACH_BATCH: u64 = 200;

const OSN_FIELD: &str = "OriginatingSystemName";
const STATUS_FIELD: &str = "StandardStatus";

type PageFuture = Pin<Box<dyn Future<Output = Result<Page<Value>, ClientError>> + Send>>;

/// An immutable query over one resource.
///
/// Chainable methods take `&self` and return a new builder, so a base query
/// can be shared by several derived ones:
///
/// ```rust,ignore
/// let active = client.properties().filter(("City", "Seattle"));
/// let cheap = active.filter(Conditions::template("ListPrice < ?").bind(400_000));
/// let newest = active.order([("ListingContractDate", SortDir::Desc)]).limit(10);
/// ```
///
/// Nothing is sent until a terminal method runs. Condition errors raised
/// while chaining are kept and returned by the first terminal call.
#[derive(Clone, Debug)]
#[must_use]
pub struct QueryBuilder {
    client: ResoClient,
    resource: Resource,
    conditions: Vec<String>,
    select: Option<Vec<String>>,
    order: Option<Vec<OrderClause>>,
    limit: Option<u64>,
    offset: Option<u64>,
    includes: Option<Vec<String>>,
    count: bool,
    unscoped: bool,
    error: Option<ConditionError>,
    records: Option<Vec<Value>>,
}

impl QueryBuilder {
    pub(crate) fn new(client: ResoClient, resource: Resource) -> Self {
        Self {
            client,
            resource,
            conditions: Vec::new(),
            select: None,
            order: None,
            limit: None,
            offset: None,
            includes: None,
            count: false,
            unscoped: false,
            error: None,
            records: None,
        }
    }

    /// Copy of the query state without the loaded records.
    fn derive(&self) -> Self {
        Self {
            client: self.client.clone(),
            resource: self.resource,
            conditions: self.conditions.clone(),
            select: self.select.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
            includes: self.includes.clone(),
            count: self.count,
            unscoped: self.unscoped,
            error: self.error.clone(),
            records: None,
        }
    }

    #[must_use]
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Add filter conditions, ANDed with the existing ones.
    pub fn filter(&self, conditions: impl Into<Conditions>) -> Self {
        self.derive().with_conditions(&conditions.into(), false)
    }

    /// Add negated filter conditions.
    pub fn filter_not(&self, conditions: impl Into<Conditions>) -> Self {
        self.where_chain().not(conditions)
    }

    /// Two-step form: `query.where_chain().not(conditions)`.
    pub fn where_chain(&self) -> WhereChain {
        WhereChain::new(self.derive())
    }

    pub(crate) fn with_conditions(mut self, conditions: &Conditions, negate: bool) -> Self {
        if self.error.is_none() {
            match parse(conditions, negate) {
                Ok(fragments) => self.conditions.extend(fragments),
                Err(e) => self.error = Some(e),
            }
        }
        self.records = None;
        self
    }

    /// `$select`, replacing any earlier selection.
    pub fn select<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.derive();
        next.select = Some(fields.into_iter().map(Into::into).collect());
        next
    }

    /// `$orderby` from `(field, SortDir)` pairs or literal clauses,
    /// replacing any earlier ordering.
    pub fn order<I, C>(&self, clauses: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<OrderClause>,
    {
        let mut next = self.derive();
        next.order = Some(clauses.into_iter().map(Into::into).collect());
        next
    }

    /// `$top`
    pub fn limit(&self, n: u64) -> Self {
        let mut next = self.derive();
        next.limit = Some(n);
        next
    }

    /// `$skip`
    pub fn offset(&self, n: u64) -> Self {
        let mut next = self.derive();
        next.offset = Some(n);
        next
    }

    /// `$expand`, replacing any earlier expansion.
    pub fn include<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.derive();
        next.includes = Some(names.into_iter().map(Into::into).collect());
        next
    }

    /// Drop the default status scope of property queries.
    pub fn unscoped(&self) -> Self {
        let mut next = self.derive();
        next.unscoped = true;
        next
    }

    /// The `$filter` value: the client's OSN first (unless a condition
    /// already names the field), then the conditions in order, then the
    /// default scope for property queries that are not unscoped and carry
    /// no status condition. `None` when there is nothing to filter on.
    ///
    /// # Errors
    ///
    /// The first condition error raised while chaining.
    pub fn render_filter(&self) -> Result<Option<String>, ClientError> {
        if let Some(e) = &self.error {
            return Err(e.clone().into());
        }

        let mut filters = self.conditions.clone();
        if let Some(osn) = self.client.osn()
            && !filters.iter().any(|f| f.contains(OSN_FIELD))
        {
            filters.insert(0, format!("{OSN_FIELD} eq {}", quote(osn)));
        }
        if self.resource == Resource::Properties
            && !self.unscoped
            && !filters.iter().any(|f| f.contains(STATUS_FIELD))
        {
            filters.push(DEFAULT_PROPERTIES_SCOPE.to_owned());
        }

        Ok((!filters.is_empty()).then(|| filters.join(" and ")))
    }

    /// Query parameters for the next request. Unset options are omitted.
    ///
    /// # Errors
    ///
    /// As [`render_filter`](Self::render_filter).
    pub fn params(&self) -> Result<ODataParams, ClientError> {
        let joined = |items: &Option<Vec<String>>| {
            items
                .as_ref()
                .filter(|items| !items.is_empty())
                .map(|items| items.join(","))
        };
        Ok(ODataParams::new()
            .set_opt("$filter", self.render_filter()?)
            .set_opt("$select", joined(&self.select))
            .set_opt(
                "$orderby",
                self.order
                    .as_deref()
                    .filter(|clauses| !clauses.is_empty())
                    .map(render_order),
            )
            .set_opt("$top", self.limit.map(|n| n.to_string()))
            .set_opt("$skip", self.offset.map(|n| n.to_string()))
            .set_opt("$expand", joined(&self.includes))
            .set_opt("$count", self.count.then_some("true")))
    }

    /// The decoded URL the next terminal call would request.
    ///
    /// # Errors
    ///
    /// As [`render_filter`](Self::render_filter).
    pub fn debug_url(&self) -> Result<String, ClientError> {
        let params = self.params()?;
        let url = self.client.executor().url_for(self.resource.path(), &params);
        Ok(decode_url(&url))
    }

    /// Fetch one record by its key. Ignores the query's filters.
    ///
    /// # Errors
    ///
    /// Request failures after retries.
    pub async fn find(&self, key: &str) -> Result<Payload, ClientError> {
        self.client.detail(self.resource, key).await
    }

    /// First record matching `conditions`.
    ///
    /// # Errors
    ///
    /// Condition errors, then request failures after retries.
    pub async fn find_by(
        &self,
        conditions: impl Into<Conditions>,
    ) -> Result<Option<Value>, ClientError> {
        self.filter(conditions).first().await
    }

    /// # Errors
    ///
    /// Condition errors, then request failures after retries.
    pub async fn first(&self) -> Result<Option<Value>, ClientError> {
        Ok(self.limit(1).into_records().await?.into_iter().next())
    }

    /// Up to `n` records from the head of the result order.
    ///
    /// # Errors
    ///
    /// Condition errors, then request failures after retries.
    pub async fn first_n(&self, n: u64) -> Result<Vec<Value>, ClientError> {
        self.limit(n).into_records().await
    }

    /// The server-reported total (`@odata.totalCount`), fetched with a page
    /// size of one. A response without a count reads as zero.
    ///
    /// # Errors
    ///
    /// Condition errors, then request failures after retries.
    pub async fn count(&self) -> Result<u64, ClientError> {
        let mut query = self.derive();
        query.count = true;
        query.limit = Some(1);
        let page = query.fetch(PageRequest::First).await?;
        Ok(page.total_count.unwrap_or(0))
    }

    /// The first page of records, loaded once and kept until
    /// [`reload`](Self::reload).
    ///
    /// # Errors
    ///
    /// Condition errors, then request failures after retries.
    pub async fn records(&mut self) -> Result<&[Value], ClientError> {
        if self.records.is_none() {
            let page = self.fetch(PageRequest::First).await?;
            self.records = Some(page.items);
        }
        Ok(self.records.as_deref().unwrap_or_default())
    }

    /// # Errors
    ///
    /// As [`records`](Self::records).
    pub async fn into_records(mut self) -> Result<Vec<Value>, ClientError> {
        self.records().await?;
        Ok(self.records.unwrap_or_default())
    }

    /// # Errors
    ///
    /// As [`records`](Self::records).
    pub async fn len(&mut self) -> Result<usize, ClientError> {
        Ok(self.records().await?.len())
    }

    /// # Errors
    ///
    /// As [`records`](Self::records).
    pub async fn is_empty(&mut self) -> Result<bool, ClientError> {
        Ok(self.records().await?.is_empty())
    }

    /// # Errors
    ///
    /// As [`records`](Self::records).
    pub async fn get(&mut self, index: usize) -> Result<Option<&Value>, ClientError> {
        Ok(self.records().await?.get(index))
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.records.is_some()
    }

    /// Forget loaded records; the next terminal call fetches again.
    pub fn reload(&mut self) -> &mut Self {
        self.records = None;
        self
    }

    /// Call `consumer` for every record of every page, following
    /// `@odata.nextLink` until the last page.
    ///
    /// # Errors
    ///
    /// Condition errors, then the first page request that fails after
    /// retries. Records of earlier pages have been delivered by then.
    pub async fn each<F>(&self, mut consumer: F) -> Result<(), ClientError>
    where
        F: FnMut(Value),
    {
        self.each_page(|records| records.into_iter().for_each(&mut consumer))
            .await
    }

    /// As [`each`](Self::each), one call per page.
    ///
    /// # Errors
    ///
    /// As [`each`](Self::each).
    pub async fn each_page<F>(&self, mut consumer: F) -> Result<(), ClientError>
    where
        F: FnMut(Vec<Value>),
    {
        let params = self.params()?;
        self.client
            .for_each_page(self.resource.path(), &params, &mut consumer)
            .await
    }

    /// Walk every page `batch_size` records at a time.
    ///
    /// # Errors
    ///
    /// As [`each`](Self::each).
    pub async fn find_each<F>(&self, batch_size: u64, consumer: F) -> Result<(), ClientError>
    where
        F: FnMut(Value),
    {
        self.limit(batch_size).each(consumer).await
    }

    /// Records of every page as a `Stream`.
    pub fn stream(&self) -> impl Stream<Item = Result<Value, ClientError>> + Send + 'static {
        RecordPager::new(self.page_fetcher())
    }

    /// Pages as a `Stream`.
    pub fn pages(&self) -> impl Stream<Item = Result<Page<Value>, ClientError>> + Send + 'static {
        PagesPager::new(self.page_fetcher())
    }

    async fn fetch(&self, request: PageRequest) -> Result<Page<Value>, ClientError> {
        let params = self.params()?;
        self.client
            .fetch_page(self.resource.path(), &params, request)
            .await
    }

    fn page_fetcher(&self) -> impl FnMut(PageRequest) -> PageFuture + Send + 'static {
        let client = self.client.clone();
        let endpoint = self.resource.path();
        let (params, mut pending_error) = match self.params() {
            Ok(params) => (params, None),
            Err(e) => (ODataParams::new(), Some(e)),
        };

        move |request| -> PageFuture {
            let client = client.clone();
            let params = params.clone();
            let error = pending_error.take();
            Box::pin(async move {
                if let Some(e) = error {
                    return Err(e);
                }
                client.fetch_page(endpoint, &params, request).await
            })
        }
    }
}
