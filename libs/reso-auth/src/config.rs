use std::fmt;

use url::Url;

use crate::error::TokenError;
use crate::secret::SecretString;

/// How client credentials reach the token endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthMethod {
    /// `client_id` and `client_secret` as form fields. RESO providers
    /// overwhelmingly expect this.
    #[default]
    Form,
    /// `Authorization: Basic base64(client_id:client_secret)`
    Basic,
}

/// Client-credentials settings. `Debug` redacts the secret.
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub token_endpoint: Url,

    pub client_id: String,

    pub client_secret: SecretString,

    /// Sent space-joined as `scope`; omitted when empty.
    pub scopes: Vec<String>,

    pub auth_method: ClientAuthMethod,

    /// Transport for the token endpoint. `None` uses the defaults.
    pub http_config: Option<reso_http::HttpClientConfig>,
}

impl OAuthClientConfig {
    pub fn new(
        token_endpoint: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<SecretString>,
    ) -> Self {
        Self {
            token_endpoint,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: Vec::new(),
            auth_method: ClientAuthMethod::default(),
            http_config: None,
        }
    }

    /// # Errors
    ///
    /// [`TokenError::ConfigError`] for an empty `client_id` or `client_secret`.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.client_id.trim().is_empty() {
            return Err(TokenError::ConfigError(
                "client_id must not be empty".into(),
            ));
        }
        if self.client_secret.is_empty() {
            return Err(TokenError::ConfigError(
                "client_secret must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn scope_param(&self) -> Option<String> {
        let scopes: Vec<&str> = self
            .scopes
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if scopes.is_empty() {
            None
        } else {
            Some(scopes.join(" "))
        }
    }
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("auth_method", &self.auth_method)
            .field("http_config", &self.http_config)
            .finish()
    }
}
