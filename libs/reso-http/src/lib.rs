#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! HTTP transport for RESO Web API clients.
//!
//! A thin hyper client with rustls TLS (HTTPS only unless told otherwise),
//! pooled connections, per-request timeouts and capped body reads.
//!
//! Retrying is left to callers: the RESO executor classifies
//! response bodies, not only status codes, before deciding to retry.
//!
//! ```ignore
//! use reso_http::HttpClient;
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .user_agent("my-app/1.0")
//!     .build()?;
//!
//! let body = client
//!     .get("https://api.example.com/Property")
//!     .bearer_auth(&token)
//!     .send()
//!     .await?
//!     .bytes()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod request;
mod response;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT, HttpClientConfig, TlsRootConfig,
    TransportSecurity,
};
pub use error::{HttpError, InvalidUriKind};
pub use http::{HeaderMap, StatusCode};
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse, parse_retry_after};
