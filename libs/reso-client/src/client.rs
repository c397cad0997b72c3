use std::sync::Arc;

use reso_auth::{
    BearerSource, FileTokenCache, OAuthClientConfig, TokenCache, TokenCacheKey, TokenManager,
};
use reso_http::HttpClientBuilder;
use reso_odata::quote;
use serde_json::Value;
use url::Url;

use crate::config::{AuthMode, ClientConfig};
use crate::error::ClientError;
use crate::executor::{Executor, Payload};
use crate::legacy::{Delivery, QueryOptions};
use crate::metadata;
use crate::pager::{Page, PageRequest};
use crate::query::{ODataParams, QueryBuilder};
use crate::resources::{METADATA_PATH, Resource};

/// A RESO Web API client.
///
/// Cheap to clone; clones share the HTTP connection pool and the token
/// manager.
#[derive(Clone, Debug)]
pub struct ResoClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    executor: Executor,
    base_url: Url,
    osn: Option<String>,
}

impl ResoClient {
    /// # Errors
    ///
    /// [`ClientError::Http`] if the HTTP client cannot be built,
    /// [`ClientError::Token`] for unusable OAuth credentials.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = HttpClientBuilder::with_config(config.http().clone()).build()?;
        let bearer = match config.auth() {
            AuthMode::AccessToken(token) => BearerSource::Static(token.clone()),
            AuthMode::ClientCredentials {
                client_id,
                client_secret,
                auth_url,
                scope,
            } => {
                let mut oauth =
                    OAuthClientConfig::new(auth_url.clone(), client_id.clone(), client_secret.clone());
                oauth.scopes = scope.iter().cloned().collect();
                oauth.http_config = Some(config.http().clone());

                let cache: Arc<dyn TokenCache> = match config.token_cache() {
                    Some(cache) => Arc::clone(cache),
                    None => Arc::new(FileTokenCache::in_temp_dir()),
                };
                let key = TokenCacheKey::new(config.base_url().as_str(), client_id.clone());
                BearerSource::Managed(Arc::new(TokenManager::new(oauth, cache, key)?))
            }
        };

        tracing::debug!(
            base_url = %config.base_url(),
            osn = ?config.osn(),
            managed_token = bearer.is_managed(),
            "RESO client created"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                executor: Executor::new(http, config.base_url(), bearer, config.retry()),
                base_url: config.base_url().clone(),
                osn: config.osn().map(str::to_owned),
            }),
        })
    }

    /// Client configured from `RESO_*` environment variables.
    ///
    /// # Errors
    ///
    /// [`ClientError::Config`] for missing or invalid settings, otherwise as
    /// [`new`](Self::new).
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The originating system every query is restricted to, if any.
    #[must_use]
    pub fn osn(&self) -> Option<&str> {
        self.inner.osn.as_deref()
    }

    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    /// A query over the resource called `name` (`"properties"`, `"members"`,
    /// `"offices"`, `"open_houses"`, `"media"`).
    ///
    /// # Errors
    ///
    /// [`ClientError::UnknownResource`] for any other name.
    pub fn resource(&self, name: &str) -> Result<QueryBuilder, ClientError> {
        Ok(self.query_builder(Resource::from_name(name)?))
    }

    pub fn query_builder(&self, resource: Resource) -> QueryBuilder {
        QueryBuilder::new(self.clone(), resource)
    }

    pub fn properties(&self) -> QueryBuilder {
        self.query_builder(Resource::Properties)
    }

    pub fn members(&self) -> QueryBuilder {
        self.query_builder(Resource::Members)
    }

    pub fn offices(&self) -> QueryBuilder {
        self.query_builder(Resource::Offices)
    }

    pub fn open_houses(&self) -> QueryBuilder {
        self.query_builder(Resource::OpenHouses)
    }

    pub fn media(&self) -> QueryBuilder {
        self.query_builder(Resource::Media)
    }

    /// GET one entity by key, e.g. `/Property('3yd-ABC-123')`.
    ///
    /// # Errors
    ///
    /// Request failures after retries.
    pub async fn detail(&self, resource: Resource, key: &str) -> Result<Payload, ClientError> {
        self.executor()
            .execute(&resource.detail_path(key), &ODataParams::new())
            .await
    }

    /// # Errors
    ///
    /// As [`detail`](Self::detail).
    pub async fn property(&self, key: &str) -> Result<Payload, ClientError> {
        self.detail(Resource::Properties, key).await
    }

    /// # Errors
    ///
    /// As [`detail`](Self::detail).
    pub async fn member(&self, key: &str) -> Result<Payload, ClientError> {
        self.detail(Resource::Members, key).await
    }

    /// # Errors
    ///
    /// As [`detail`](Self::detail).
    pub async fn office(&self, key: &str) -> Result<Payload, ClientError> {
        self.detail(Resource::Offices, key).await
    }

    /// # Errors
    ///
    /// As [`detail`](Self::detail).
    pub async fn open_house(&self, key: &str) -> Result<Payload, ClientError> {
        self.detail(Resource::OpenHouses, key).await
    }

    /// # Errors
    ///
    /// As [`detail`](Self::detail).
    pub async fn medium(&self, key: &str) -> Result<Payload, ClientError> {
        self.detail(Resource::Media, key).await
    }

    /// One request built from raw options. No default scope is applied.
    ///
    /// # Errors
    ///
    /// Request failures after retries.
    pub async fn query(
        &self,
        resource: Resource,
        options: &QueryOptions,
    ) -> Result<Payload, ClientError> {
        self.executor()
            .execute(resource.path(), &options.to_params(self.osn()))
            .await
    }

    /// As [`query`](Self::query), following `@odata.nextLink` and handing
    /// each record (or each page, with [`QueryOptions::batch`]) to
    /// `consumer`.
    ///
    /// # Errors
    ///
    /// The first page request that fails after retries.
    pub async fn query_each<F>(
        &self,
        resource: Resource,
        options: &QueryOptions,
        mut consumer: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(Delivery),
    {
        let params = options.to_params(self.osn());
        let batch = options.batch;
        self.for_each_page(resource.path(), &params, |records| {
            if batch {
                consumer(Delivery::Page(records));
                return;
            }
            for record in records {
                consumer(Delivery::Record(record));
            }
        })
        .await
    }

    /// The raw `$metadata` document.
    ///
    /// # Errors
    ///
    /// Request failures after retries.
    pub async fn metadata(&self) -> Result<String, ClientError> {
        let payload = self
            .executor()
            .execute(METADATA_PATH, &ODataParams::new())
            .await?;
        Ok(payload.into_text())
    }

    /// Entity type names declared by the server's `$metadata`.
    ///
    /// # Errors
    ///
    /// Request failures, or [`ClientError::Metadata`] for an unreadable
    /// document.
    pub async fn entity_names(&self) -> Result<Vec<String>, ClientError> {
        metadata::entity_names(&self.metadata().await?)
    }

    /// Entity names that `/Property` accepts in `$expand`, comma-joined.
    /// Each candidate is probed with a single unretried request; `None` when
    /// none is accepted.
    ///
    /// # Errors
    ///
    /// Failures fetching `$metadata`. Probe failures only exclude the
    /// candidate.
    pub async fn supported_expandables(&self) -> Result<Option<String>, ClientError> {
        let mut supported = Vec::new();
        for entity in self.entity_names().await? {
            if self.try_expand(&entity).await {
                supported.push(entity);
            }
        }
        tracing::debug!(count = supported.len(), "probed $expand candidates");
        Ok((!supported.is_empty()).then(|| supported.join(",")))
    }

    async fn try_expand(&self, entity: &str) -> bool {
        let osn_filter = self
            .osn()
            .map(|osn| format!("OriginatingSystemName eq {}", quote(osn)));
        let params = ODataParams::new()
            .set("$expand", entity)
            .set_opt("$filter", osn_filter);

        match self
            .executor()
            .execute_with_retries(Resource::Properties.path(), &params, 0)
            .await
        {
            Ok(payload) => expand_accepted(&payload),
            Err(e) => {
                tracing::debug!(entity, error = %e, "$expand probe failed");
                false
            }
        }
    }

    pub(crate) async fn fetch_page(
        &self,
        endpoint: &str,
        params: &ODataParams,
        request: PageRequest,
    ) -> Result<Page<Value>, ClientError> {
        let payload = match request {
            PageRequest::First => self.executor().execute(endpoint, params).await?,
            PageRequest::Next(link) => self.executor().execute(&link, &ODataParams::new()).await?,
        };
        Ok(payload.into_page())
    }

    pub(crate) async fn for_each_page<F>(
        &self,
        endpoint: &str,
        params: &ODataParams,
        mut consumer: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(Vec<Value>),
    {
        let mut request = PageRequest::First;
        loop {
            let page = self.fetch_page(endpoint, params, request).await?;
            consumer(page.items);
            match page.next_link {
                Some(link) => request = PageRequest::Next(link),
                None => return Ok(()),
            }
        }
    }
}

fn expand_accepted(payload: &Payload) -> bool {
    match payload {
        Payload::Json(Value::Object(body)) => ["error", "statusCode", "status"]
            .iter()
            .all(|key| body.get(*key).is_none_or(is_blank)),
        Payload::Text(text) => !text.contains("status"),
        Payload::Json(_) | Payload::Debug(_) => true,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(true) | Value::Number(_) => false,
    }
}
