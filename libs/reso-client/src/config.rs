use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use figment::Figment;
use figment::providers::Env;
use reso_auth::{SecretString, TokenCache};
use reso_http::HttpClientConfig;
use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// Prefix for [`ClientConfig::from_env`] variables, e.g. `RESO_BASE_URL`.
pub const ENV_PREFIX: &str = "RESO_";

/// How requests are authorized.
#[derive(Clone, Debug)]
pub enum AuthMode {
    /// A pre-obtained bearer token, used as is.
    AccessToken(SecretString),
    /// OAuth2 client-credentials exchange against `auth_url`.
    ClientCredentials {
        client_id: String,
        client_secret: SecretString,
        auth_url: Url,
        scope: Option<String>,
    },
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a call makes at most
    /// `max_retries + 1` attempts.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// Validated client configuration. Immutable once built.
#[derive(Clone)]
pub struct ClientConfig {
    base_url: Url,
    auth: AuthMode,
    osn: Option<String>,
    retry: RetryPolicy,
    http: HttpClientConfig,
    token_cache: Option<Arc<dyn TokenCache>>,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Build from a flat [`ClientSettings`] document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Settings`] if the document does not deserialize, then
    /// anything [`ClientConfigBuilder::build`] rejects.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let settings: ClientSettings = figment
            .extract()
            .map_err(|e| ConfigError::Settings(e.to_string()))?;
        settings.into_builder().build()
    }

    /// Build from `RESO_`-prefixed environment variables
    /// (`RESO_BASE_URL`, `RESO_CLIENT_ID`, ...).
    ///
    /// # Errors
    ///
    /// As [`from_figment`](Self::from_figment).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(&Figment::from(Env::prefixed(ENV_PREFIX)))
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn auth(&self) -> &AuthMode {
        &self.auth
    }

    /// Originating System Name injected into every filter.
    #[must_use]
    pub fn osn(&self) -> Option<&str> {
        self.osn.as_deref()
    }

    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    #[must_use]
    pub fn http(&self) -> &HttpClientConfig {
        &self.http
    }

    #[must_use]
    pub fn token_cache(&self) -> Option<&Arc<dyn TokenCache>> {
        self.token_cache.as_ref()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("auth", &self.auth)
            .field("osn", &self.osn)
            .field("retry", &self.retry)
            .field("http", &self.http)
            .field("token_cache", &self.token_cache.is_some())
            .finish()
    }
}

/// Builder for [`ClientConfig`]. Empty strings count as unset.
#[derive(Default)]
#[must_use]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    access_token: Option<SecretString>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    auth_url: Option<String>,
    scope: Option<String>,
    osn: Option<String>,
    retry: RetryPolicy,
    http: Option<HttpClientConfig>,
    token_cache: Option<Arc<dyn TokenCache>>,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Use a pre-obtained token; client credentials are then ignored.
    pub fn access_token(mut self, token: impl Into<SecretString>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    pub fn client_secret(mut self, secret: impl Into<SecretString>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn osn(mut self, osn: impl Into<String>) -> Self {
        self.osn = Some(osn.into());
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry.delay = delay;
        self
    }

    pub fn http_config(mut self, http: HttpClientConfig) -> Self {
        self.http = Some(http);
        self
    }

    /// Replace the default file cache in the OS temp dir.
    pub fn token_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
        self.token_cache = Some(cache);
        self
    }

    /// # Errors
    ///
    /// [`ConfigError::Missing`] for the first absent required field (in the
    /// order `client_id`, `client_secret`, `auth_url`, `base_url` without an
    /// access token; only `base_url` with one), [`ConfigError::InvalidUrl`]
    /// for URLs that do not parse.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let access_token = self.access_token.filter(|t| !t.is_empty());

        let auth = if let Some(token) = access_token {
            required(self.base_url.as_ref(), "base_url")?;
            AuthMode::AccessToken(token)
        } else {
            let client_id = required(self.client_id.as_ref(), "client_id")?.to_owned();
            let client_secret = self
                .client_secret
                .filter(|s| !s.is_empty())
                .ok_or(ConfigError::Missing {
                    field: "client_secret",
                })?;
            let auth_url = required(self.auth_url.as_ref(), "auth_url")?;
            required(self.base_url.as_ref(), "base_url")?;
            AuthMode::ClientCredentials {
                client_id,
                client_secret,
                auth_url: parse_url(auth_url, "auth_url")?,
                scope: self.scope.filter(|s| !s.trim().is_empty()),
            }
        };

        let base_url = parse_url(required(self.base_url.as_ref(), "base_url")?, "base_url")?;

        Ok(ClientConfig {
            base_url,
            auth,
            osn: self.osn.filter(|s| !s.trim().is_empty()),
            retry: self.retry,
            http: self.http.unwrap_or_default(),
            token_cache: self.token_cache,
        })
    }
}

fn required<'a>(value: Option<&'a String>, field: &'static str) -> Result<&'a str, ConfigError> {
    value
        .map(String::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::Missing { field })
}

fn parse_url(raw: &str, field: &'static str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    if !url.has_host() {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: "URL has no host".to_owned(),
        });
    }
    Ok(url)
}

/// Flat settings document for [`ClientConfig::from_figment`].
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub auth_url: Option<String>,
    pub scope: Option<String>,
    pub osn: Option<String>,
    pub max_retries: Option<u32>,
    pub retry_delay_secs: Option<u64>,
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url)
            .field("access_token", &redact(&self.access_token))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("auth_url", &self.auth_url)
            .field("scope", &self.scope)
            .field("osn", &self.osn)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .finish()
    }
}

impl ClientSettings {
    pub fn into_builder(self) -> ClientConfigBuilder {
        let mut builder = ClientConfig::builder();
        if let Some(v) = self.base_url {
            builder = builder.base_url(v);
        }
        if let Some(v) = self.access_token {
            builder = builder.access_token(v);
        }
        if let Some(v) = self.client_id {
            builder = builder.client_id(v);
        }
        if let Some(v) = self.client_secret {
            builder = builder.client_secret(v);
        }
        if let Some(v) = self.auth_url {
            builder = builder.auth_url(v);
        }
        if let Some(v) = self.scope {
            builder = builder.scope(v);
        }
        if let Some(v) = self.osn {
            builder = builder.osn(v);
        }
        if let Some(v) = self.max_retries {
            builder = builder.max_retries(v);
        }
        if let Some(v) = self.retry_delay_secs {
            builder = builder.retry_delay(Duration::from_secs(v));
        }
        builder
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use figment::providers::Serialized;
    use serde_json::json;

    fn credentials() -> ClientConfigBuilder {
        ClientConfig::builder()
            .client_id("id")
            .client_secret("secret")
            .auth_url("https://auth.example.com/oauth2/token")
            .base_url("https://api.example.com/reso/odata")
    }

    #[test]
    fn client_credentials_config() {
        let cfg = credentials().scope("api").osn("NWMLS").build().unwrap();
        assert_eq!(cfg.base_url().as_str(), "https://api.example.com/reso/odata");
        assert_eq!(cfg.osn(), Some("NWMLS"));
        assert_eq!(cfg.retry(), RetryPolicy::default());
        match cfg.auth() {
            AuthMode::ClientCredentials {
                client_id, scope, ..
            } => {
                assert_eq!(client_id, "id");
                assert_eq!(scope.as_deref(), Some("api"));
            }
            AuthMode::AccessToken(_) => panic!("expected client credentials"),
        }
    }

    #[test]
    fn missing_fields_are_reported_in_order() {
        let err = ClientConfig::builder().build().unwrap_err();
        assert_eq!(err.to_string(), "Missing Client ID `client_id`");

        let err = ClientConfig::builder().client_id("id").build().unwrap_err();
        assert_eq!(err, ConfigError::Missing { field: "client_secret" });

        let err = ClientConfig::builder()
            .client_id("id")
            .client_secret("s")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing Authentication URL `auth_url`");

        let err = ClientConfig::builder()
            .client_id("id")
            .client_secret("s")
            .auth_url("https://auth.example.com")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing API Base URL `base_url`");
    }

    #[test]
    fn access_token_only_needs_base_url() {
        let err = ClientConfig::builder().access_token("tok").build().unwrap_err();
        assert_eq!(err, ConfigError::Missing { field: "base_url" });

        let cfg = ClientConfig::builder()
            .access_token("tok")
            .base_url("https://api.example.com")
            .build()
            .unwrap();
        assert!(matches!(cfg.auth(), AuthMode::AccessToken(t) if t.expose() == "tok"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = credentials().client_id("  ").build().unwrap_err();
        assert_eq!(err, ConfigError::Missing { field: "client_id" });

        let cfg = credentials().osn("").build().unwrap();
        assert_eq!(cfg.osn(), None);
    }

    #[test]
    fn unparseable_url_is_rejected() {
        let err = credentials().base_url("api.example.com").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { field: "base_url", .. }));
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = credentials().client_secret("hunter2").build().unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn from_figment_reads_flat_settings() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "base_url": "https://api.example.com/odata",
            "access_token": "tok",
            "osn": "NWMLS",
            "max_retries": 2,
            "retry_delay_secs": 0
        })));
        let cfg = ClientConfig::from_figment(&figment).unwrap();
        assert_eq!(cfg.osn(), Some("NWMLS"));
        assert_eq!(
            cfg.retry(),
            RetryPolicy {
                max_retries: 2,
                delay: Duration::ZERO
            }
        );
    }

    #[test]
    fn from_figment_rejects_bad_types() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "max_retries": "many"
        })));
        let err = ClientConfig::from_figment(&figment).unwrap_err();
        assert!(matches!(err, ConfigError::Settings(_)));
    }

    #[test]
    fn from_env_uses_prefix() {
        temp_env::with_vars(
            [
                ("RESO_BASE_URL", Some("https://api.example.com/odata")),
                ("RESO_CLIENT_ID", Some("env-id")),
                ("RESO_CLIENT_SECRET", Some("env-secret")),
                ("RESO_AUTH_URL", Some("https://auth.example.com/token")),
                ("RESO_ACCESS_TOKEN", None),
                ("RESO_OSN", None),
            ],
            || {
                let cfg = ClientConfig::from_env().unwrap();
                assert!(matches!(
                    cfg.auth(),
                    AuthMode::ClientCredentials { client_id, .. } if client_id == "env-id"
                ));
            },
        );
    }
}
