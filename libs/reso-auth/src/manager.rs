use std::fmt;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use http::header::AUTHORIZATION;
use zeroize::Zeroizing;

use crate::cache::{TokenCache, TokenCacheKey};
use crate::config::{ClientAuthMethod, OAuthClientConfig};
use crate::error::{TokenError, describe_http_error};
use crate::secret::SecretString;
use crate::token::{StoredToken, TokenResponse};

/// Client-credentials token manager.
///
/// [`bearer`](Self::bearer) resolves a token in order: the in-memory token,
/// the [`TokenCache`] entry, a fresh exchange with the token endpoint. Fresh
/// tokens are written back to the cache. Callers are serialized on the
/// in-memory slot, so concurrent requests trigger at most one exchange.
pub struct TokenManager {
    http: reso_http::HttpClient,
    config: OAuthClientConfig,
    cache: Arc<dyn TokenCache>,
    key: TokenCacheKey,
    current: tokio::sync::Mutex<Option<StoredToken>>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("config", &self.config)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// # Errors
    ///
    /// [`TokenError::ConfigError`] for invalid credentials,
    /// [`TokenError::Http`] if the HTTP client cannot be built.
    pub fn new(
        config: OAuthClientConfig,
        cache: Arc<dyn TokenCache>,
        key: TokenCacheKey,
    ) -> Result<Self, TokenError> {
        config.validate()?;

        let http_config = config.http_config.clone().unwrap_or_default();
        let http = reso_http::HttpClientBuilder::with_config(http_config)
            .build()
            .map_err(|e| TokenError::Http(describe_http_error(&e)))?;

        Ok(Self {
            http,
            config,
            cache,
            key,
            current: tokio::sync::Mutex::new(None),
        })
    }

    #[must_use]
    pub fn cache_key(&self) -> &TokenCacheKey {
        &self.key
    }

    /// An unexpired bearer token.
    ///
    /// # Errors
    ///
    /// Any [`TokenError`] from the exchange. Cache write failures are
    /// logged, not returned.
    pub async fn bearer(&self) -> Result<SecretString, TokenError> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.access_token().clone());
        }

        if let Some(token) = self.cache.get(&self.key).await {
            if token.is_expired() {
                tracing::debug!(client_id = %self.config.client_id, "cached token expired");
            } else {
                tracing::debug!(client_id = %self.config.client_id, "using cached token");
                let secret = token.access_token().clone();
                *current = Some(token);
                return Ok(secret);
            }
        }

        let token = self.exchange_and_store().await?;
        let secret = token.access_token().clone();
        *current = Some(token);
        Ok(secret)
    }

    /// Discard any held token and exchange credentials again, e.g. after
    /// the API rejected the current token.
    ///
    /// # Errors
    ///
    /// Any [`TokenError`] from the exchange.
    pub async fn force_refresh(&self) -> Result<SecretString, TokenError> {
        let mut current = self.current.lock().await;
        *current = None;
        let token = self.exchange_and_store().await?;
        let secret = token.access_token().clone();
        *current = Some(token);
        Ok(secret)
    }

    async fn exchange_and_store(&self) -> Result<StoredToken, TokenError> {
        let token = self.exchange().await?;
        if let Err(e) = self.cache.put(&self.key, &token).await {
            tracing::warn!(error = %e, "failed to persist bearer token");
        }
        Ok(token)
    }

    async fn exchange(&self) -> Result<StoredToken, TokenError> {
        tracing::debug!(
            endpoint = %self.config.token_endpoint,
            client_id = %self.config.client_id,
            "requesting client-credentials token"
        );

        let scope = self.config.scope_param();
        let mut fields: Vec<(&str, &str)> = vec![("grant_type", "client_credentials")];
        if let Some(ref scope) = scope {
            fields.push(("scope", scope));
        }

        // Scrubbed on drop.
        let secret_expose;
        if self.config.auth_method == ClientAuthMethod::Form {
            secret_expose = Zeroizing::new(self.config.client_secret.expose().to_owned());
            fields.push(("client_id", &self.config.client_id));
            fields.push(("client_secret", &secret_expose));
        }

        let mut builder = self.http.post(self.config.token_endpoint.as_str());

        if self.config.auth_method == ClientAuthMethod::Basic {
            let credentials = Zeroizing::new(format!(
                "{}:{}",
                self.config.client_id,
                self.config.client_secret.expose()
            ));
            let encoded = Zeroizing::new(general_purpose::STANDARD.encode(credentials.as_bytes()));
            let header_value = Zeroizing::new(format!("Basic {}", &*encoded));
            builder = builder.header(AUTHORIZATION.as_str(), &header_value);
        }

        let issued_at = Utc::now();
        let response: TokenResponse = builder
            .form(fields.as_slice())
            .map_err(|e| TokenError::Http(describe_http_error(&e)))?
            .send()
            .await
            .map_err(|e| TokenError::Http(describe_http_error(&e)))?
            .json()
            .await
            .map_err(|e| match e {
                reso_http::HttpError::Json(json) => TokenError::InvalidResponse(json.to_string()),
                other => TokenError::Http(describe_http_error(&other)),
            })?;

        if let Some(ref tt) = response.token_type
            && !tt.eq_ignore_ascii_case("bearer")
        {
            return Err(TokenError::UnsupportedTokenType(tt.clone()));
        }
        if response.access_token.is_empty() {
            return Err(TokenError::InvalidResponse("empty access_token".into()));
        }

        let token = StoredToken::from_response(response, issued_at);
        tracing::debug!(expires_at = ?token.expiry(), "obtained client-credentials token");
        Ok(token)
    }
}

/// Where request authorization comes from: a fixed token, or a managed
/// client-credentials flow.
#[derive(Clone, Debug)]
pub enum BearerSource {
    Static(SecretString),
    Managed(Arc<TokenManager>),
}

impl BearerSource {
    /// # Errors
    ///
    /// Any [`TokenError`] from a managed exchange.
    pub async fn token(&self) -> Result<SecretString, TokenError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Managed(manager) => manager.bearer().await,
        }
    }

    /// Force a new token. A static token is left as is.
    ///
    /// # Errors
    ///
    /// Any [`TokenError`] from a managed exchange.
    pub async fn refresh(&self) -> Result<(), TokenError> {
        match self {
            Self::Static(_) => Ok(()),
            Self::Managed(manager) => manager.force_refresh().await.map(drop),
        }
    }

    #[must_use]
    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed(_))
    }
}
