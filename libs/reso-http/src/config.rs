use std::time::Duration;

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("reso-http/", env!("CARGO_PKG_VERSION"));

/// Default cap on buffered response bodies (16 MiB). `$metadata` documents
/// for large RESO feeds run to several megabytes.
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// TLS root certificate source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Mozilla roots bundled via webpki-roots
    #[default]
    WebPki,
    /// OS certificate store
    Native,
}

/// Whether plain `http://` URLs are accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    #[default]
    TlsOnly,
    /// Local mock servers only.
    AllowInsecureHttp,
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Applies to the request and, separately, to reading its body (default: 30s)
    pub request_timeout: Duration,

    pub max_body_size: usize,

    pub user_agent: String,

    pub transport: TransportSecurity,

    pub tls_roots: TlsRootConfig,

    /// Idle pooled connections are closed after this long (`None` keeps them)
    pub pool_idle_timeout: Option<Duration>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
        }
    }
}

impl HttpClientConfig {
    /// Defaults with plain HTTP allowed, for tests against local servers.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            transport: TransportSecurity::AllowInsecureHttp,
            request_timeout: Duration::from_secs(5),
            ..Self::default()
        }
    }
}
