#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! OAuth2 client-credentials tokens for RESO Web API clients.
//!
//! [`TokenManager`] exchanges a client id and secret for a bearer token,
//! keeps it in memory and in a [`TokenCache`], and refreshes it once its
//! JWT `exp` (or `expires_in`) has passed. [`FileTokenCache`] persists one
//! JSON file per API and client in the temp dir, so repeated process starts
//! reuse a token.
//!
//! ```ignore
//! use std::sync::Arc;
//! use reso_auth::{FileTokenCache, OAuthClientConfig, TokenCacheKey, TokenManager};
//!
//! let config = OAuthClientConfig::new(token_url, "client-id", "client-secret");
//! let key = TokenCacheKey::new("https://api.example.com/reso/odata", "client-id");
//! let manager = TokenManager::new(config, Arc::new(FileTokenCache::in_temp_dir()), key)?;
//! let token = manager.bearer().await?;
//! ```

mod cache;
mod claims;
mod config;
mod error;
mod manager;
mod secret;
mod token;

pub use cache::{FileTokenCache, MemoryTokenCache, TokenCache, TokenCacheKey};
pub use claims::jwt_expiry;
pub use config::{ClientAuthMethod, OAuthClientConfig};
pub use error::TokenError;
pub use manager::{BearerSource, TokenManager};
pub use secret::SecretString;
pub use token::StoredToken;
