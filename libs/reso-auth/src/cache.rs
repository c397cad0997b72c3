//! Persisted bearer tokens, so short-lived processes can reuse a token
//! instead of authenticating on every start.
//!
//! Concurrent writers sharing a key race with last-writer-wins, which is
//! fine: any unexpired token works.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::TokenError;
use crate::token::StoredToken;

/// Identifies one (API, client) pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TokenCacheKey {
    slug: String,
    client_id: String,
}

impl TokenCacheKey {
    /// `base_url` is normalized into a lowercase, dash-separated slug.
    pub fn new(base_url: &str, client_id: impl Into<String>) -> Self {
        Self {
            slug: parameterize(base_url),
            client_id: client_id.into(),
        }
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// `<slug>-<client_id>-oauth-token.json`, with the client id normalized
    /// like the slug so the name never leaves the cache directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-oauth-token.json",
            self.slug,
            parameterize(&self.client_id)
        )
    }
}

/// Lowercase ASCII alphanumerics, `-` and `_` kept; every other run of
/// characters becomes a single `-`; no leading or trailing `-`.
fn parameterize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Storage for bearer tokens keyed by [`TokenCacheKey`].
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// `None` when absent, unreadable or corrupt.
    async fn get(&self, key: &TokenCacheKey) -> Option<StoredToken>;

    /// Store `token`, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// [`TokenError::Cache`] when the entry cannot be written.
    async fn put(&self, key: &TokenCacheKey, token: &StoredToken) -> Result<(), TokenError>;
}

/// One JSON file per key in a directory (the OS temp dir by default).
#[derive(Clone, Debug)]
pub struct FileTokenCache {
    dir: PathBuf,
}

impl FileTokenCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, key: &TokenCacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl Default for FileTokenCache {
    fn default() -> Self {
        Self::in_temp_dir()
    }
}

#[async_trait]
impl TokenCache for FileTokenCache {
    async fn get(&self, key: &TokenCacheKey) -> Option<StoredToken> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable token cache file");
                return None;
            }
        };
        match StoredToken::from_json(&bytes) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt token cache file");
                None
            }
        }
    }

    async fn put(&self, key: &TokenCacheKey, token: &StoredToken) -> Result<(), TokenError> {
        let path = self.path_for(key);
        let bytes = token
            .to_json()
            .map_err(|e| TokenError::Cache(e.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| TokenError::Cache(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "persisted bearer token");
        Ok(())
    }
}

/// Process-local cache for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    entries: Mutex<HashMap<TokenCacheKey, StoredToken>>,
}

impl MemoryTokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn get(&self, key: &TokenCacheKey) -> Option<StoredToken> {
        self.entries.lock().get(key).cloned()
    }

    async fn put(&self, key: &TokenCacheKey, token: &StoredToken) -> Result<(), TokenError> {
        self.entries.lock().insert(key.clone(), token.clone());
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parameterize_urls() {
        assert_eq!(
            parameterize("https://api.bridgedataoutput.com/api/v2/OData/"),
            "https-api-bridgedataoutput-com-api-v2-odata"
        );
        assert_eq!(parameterize("--A  b__c--"), "a-b__c");
        assert_eq!(parameterize(""), "");
    }

    #[test]
    fn key_file_name() {
        let key = TokenCacheKey::new("https://api.example.com/reso", "client-1");
        assert_eq!(
            key.file_name(),
            "https-api-example-com-reso-client-1-oauth-token.json"
        );
    }

    #[test]
    fn client_id_cannot_escape_cache_dir() {
        let cache = FileTokenCache::new("/var/cache/reso");
        let key = TokenCacheKey::new("https://api.example.com/reso", "../x/evil");
        assert_eq!(
            key.file_name(),
            "https-api-example-com-reso-x-evil-oauth-token.json"
        );
        let path = cache.path_for(&key);
        assert_eq!(path.parent(), Some(Path::new("/var/cache/reso")));
        assert_eq!(key.client_id(), "../x/evil");
    }

    #[tokio::test]
    async fn memory_cache_round_trip() {
        let cache = MemoryTokenCache::new();
        let key = TokenCacheKey::new("https://a.example.com", "c");
        assert!(cache.get(&key).await.is_none());
        cache.put(&key, &StoredToken::new("tok")).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().access_token().expose(), "tok");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn file_cache_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let key = TokenCacheKey::new("https://a.example.com", "c");

        FileTokenCache::new(dir.path())
            .put(&key, &StoredToken::new("tok"))
            .await
            .unwrap();

        let reopened = FileTokenCache::new(dir.path());
        assert!(reopened.path_for(&key).exists());
        let token = reopened.get(&key).await.unwrap();
        assert_eq!(token.access_token().expose(), "tok");
    }

    #[tokio::test]
    async fn corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTokenCache::new(dir.path());
        let key = TokenCacheKey::new("https://a.example.com", "c");
        std::fs::write(cache.path_for(&key), b"{not json").unwrap();
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn unwritable_dir_reports_cache_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTokenCache::new(dir.path().join("missing").join("nested"));
        let key = TokenCacheKey::new("https://a.example.com", "c");
        let err = cache.put(&key, &StoredToken::new("tok")).await.unwrap_err();
        assert!(matches!(err, TokenError::Cache(_)));
    }
}
