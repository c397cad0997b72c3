#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Client for RESO Web API (`OData` v4) listing feeds.
//!
//! [`ResoClient`] owns the HTTP transport, bearer authorization and the
//! retry policy. Queries are built with the immutable [`QueryBuilder`]:
//! every chained call returns a new builder and nothing is sent until a
//! terminal method (`records`, `first`, `count`, `each`, `stream`, ...)
//! runs.
//!
//! ```ignore
//! use reso_client::{ClientConfig, ResoClient};
//! use reso_odata::{Conditions, SortDir};
//!
//! let client = ResoClient::new(
//!     ClientConfig::builder()
//!         .base_url("https://api.example.com/reso/odata")
//!         .client_id("id")
//!         .client_secret("secret")
//!         .auth_url("https://auth.example.com/oauth2/token")
//!         .osn("NWMLS")
//!         .build()?,
//! )?;
//!
//! let newest = client
//!     .properties()
//!     .filter(("City", "Seattle"))
//!     .filter(Conditions::template("ListPrice >= ?").bind(500_000))
//!     .order([("ModificationTimestamp", SortDir::Desc)])
//!     .first_n(10)
//!     .await?;
//! ```
//!
//! Property queries are scoped to active and pending listings unless a
//! status condition is given or [`QueryBuilder::unscoped`] is used. A
//! configured originating system name (OSN) restricts every query.

mod client;
mod config;
mod error;
mod executor;
mod legacy;
mod metadata;
mod pager;
mod query;
mod resources;

pub use client::ResoClient;
pub use config::{
    AuthMode, ClientConfig, ClientConfigBuilder, ClientSettings, ENV_PREFIX, RetryPolicy,
};
pub use error::{ClientError, ConfigError, FailureReason};
pub use executor::{Executor, Outcome, Payload, classify};
pub use legacy::{Delivery, QueryOptions};
pub use metadata::{EDM_NAMESPACE, entity_names};
pub use pager::{Page, PageRequest, PagesPager, RecordPager};
pub use query::{
    DEBUG_PARAM, DEFAULT_FIND_EACH_BATCH, DEFAULT_PROPERTIES_SCOPE, ODataParams, QueryBuilder,
    WhereChain,
};
pub use resources::{METADATA_PATH, Resource};

pub use reso_auth::{FileTokenCache, MemoryTokenCache, SecretString, TokenCache, TokenCacheKey};
pub use reso_odata::{Conditions, OrderClause, SortDir, Template, ValueRange};
