use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::claims::jwt_expiry;
use crate::secret::SecretString;

/// Token endpoint response. Unknown fields are ignored.
///
/// `Deserialize`-only so it cannot be serialized into a log by accident.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// A bearer token as held in memory and in the token cache.
#[derive(Clone, Debug)]
pub struct StoredToken {
    access_token: SecretString,
    token_type: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    /// Absolute expiry from `expires_in`, fixed at exchange time.
    expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    pub(crate) fn from_response(resp: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let expires_at = resp
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| issued_at.checked_add_signed(delta));
        Self {
            access_token: SecretString::new(resp.access_token),
            token_type: resp.token_type,
            expires_in: resp.expires_in,
            scope: resp.scope,
            expires_at,
        }
    }

    /// A token with no expiry information, e.g. for seeding a cache in tests.
    pub fn new(access_token: impl Into<SecretString>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: Some("Bearer".to_owned()),
            expires_in: None,
            scope: None,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn with_expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    #[must_use]
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// The JWT `exp` claim when present, else the `expires_in`-derived time.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        jwt_expiry(self.access_token.expose()).or(self.expires_at)
    }

    /// A token without any expiry information counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry().is_none_or(|exp| exp <= now)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// On-disk shape. `expires_at` is epoch seconds.
#[derive(Serialize, Deserialize)]
struct PersistedToken {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

impl StoredToken {
    pub(crate) fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let mut persisted = PersistedToken {
            access_token: self.access_token.expose().to_owned(),
            token_type: self.token_type.clone(),
            expires_in: self.expires_in,
            expires_at: self.expires_at.as_ref().map(DateTime::timestamp),
            scope: self.scope.clone(),
        };
        let out = serde_json::to_vec(&persisted);
        persisted.access_token.zeroize();
        out
    }

    pub(crate) fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        let persisted: PersistedToken = serde_json::from_slice(bytes)?;
        Ok(Self {
            access_token: SecretString::new(persisted.access_token),
            token_type: persisted.token_type,
            expires_in: persisted.expires_in,
            scope: persisted.scope,
            expires_at: persisted
                .expires_at
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::claims::tests::make_jwt;

    fn response(token: &str, expires_in: Option<u64>) -> TokenResponse {
        TokenResponse {
            access_token: token.to_owned(),
            expires_in,
            token_type: Some("Bearer".into()),
            scope: None,
        }
    }

    #[test]
    fn jwt_exp_wins_over_expires_in() {
        let exp = Utc::now() + TimeDelta::hours(2);
        let jwt = make_jwt(&serde_json::json!({"exp": exp.timestamp()}));
        let token = StoredToken::from_response(response(&jwt, Some(60)), Utc::now());
        assert_eq!(token.expiry().unwrap().timestamp(), exp.timestamp());
        assert!(!token.is_expired());
    }

    #[test]
    fn expires_in_is_fallback_for_opaque_tokens() {
        let issued = Utc::now();
        let token = StoredToken::from_response(response("opaque", Some(3600)), issued);
        assert_eq!(token.expiry(), Some(issued + TimeDelta::seconds(3600)));
        assert!(!token.is_expired());
        assert!(token.is_expired_at(issued + TimeDelta::seconds(3600)));
    }

    #[test]
    fn no_expiry_information_counts_as_expired() {
        let token = StoredToken::from_response(response("opaque", None), Utc::now());
        assert!(token.is_expired());
    }

    #[test]
    fn past_jwt_exp_is_expired() {
        let jwt = make_jwt(&serde_json::json!({"exp": 1_000_000_000}));
        assert!(StoredToken::new(jwt).is_expired());
    }

    #[test]
    fn persisted_form_keeps_fields() {
        let issued = DateTime::from_timestamp(1_800_000_000, 0).unwrap();
        let mut resp = response("opaque", Some(600));
        resp.scope = Some("api".into());
        let token = StoredToken::from_response(resp, issued);

        let bytes = token.to_json().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["access_token"], "opaque");
        assert_eq!(json["expires_at"], 1_800_000_600);
        assert_eq!(json["scope"], "api");

        let back = StoredToken::from_json(&bytes).unwrap();
        assert_eq!(back.access_token().expose(), "opaque");
        assert_eq!(back.expiry(), token.expiry());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let token = StoredToken::new("very-secret-token");
        assert!(!format!("{token:?}").contains("very-secret-token"));
    }
}
