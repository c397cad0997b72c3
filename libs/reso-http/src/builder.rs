use std::time::Duration;

use http::header::HeaderValue;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};

use crate::client::HttpClient;
use crate::config::{HttpClientConfig, TlsRootConfig, TransportSecurity};
use crate::error::HttpError;
use crate::tls;

#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Accept plain `http://` URLs. Only available in debug builds or with
    /// the `allow-insecure-http` feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// # Errors
    ///
    /// - `InvalidHeaderValue` for a user agent that is not a valid header value
    /// - `Tls` when the root certificate store cannot be built
    pub fn build(self) -> Result<HttpClient, HttpError> {
        if self.config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!("insecure HTTP enabled; use only for testing with mock servers");
        }

        let user_agent = HeaderValue::try_from(self.config.user_agent.as_str())?;
        let https = tls::https_connector(self.config.tls_roots, self.config.transport)?;

        let mut builder = Client::builder(TokioExecutor::new());
        // pool_idle_timeout needs a timer to fire.
        builder.pool_timer(TokioTimer::new());
        if let Some(idle) = self.config.pool_idle_timeout {
            builder.pool_idle_timeout(idle);
        }

        Ok(HttpClient {
            inner: builder.build(https),
            user_agent,
            timeout: self.config.request_timeout,
            max_body_size: self.config.max_body_size,
            transport_security: self.config.transport,
        })
    }
}
