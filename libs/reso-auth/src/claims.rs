//! Unverified JWT claim decoding.
//!
//! Only the expiry is read, to decide when to refresh. The signature is not
//! checked: the token is an opaque credential for the API server, not
//! something this client trusts.

use chrono::{DateTime, Utc};
use jsonwebtoken::dangerous::insecure_decode;
use serde_json::Value;

/// The `exp` claim of a JWT, or `None` for anything that is not a JWT with
/// a numeric `exp`.
#[must_use]
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let data = match insecure_decode::<Value>(token) {
        Ok(data) => data,
        Err(e) => {
            tracing::trace!(error = %e, "access token is not a decodable JWT");
            return None;
        }
    };
    let exp = data.claims.get("exp")?;

    let seconds = exp
        .as_i64()
        .or_else(|| exp.as_str().and_then(|s| s.parse().ok()))?;
    DateTime::from_timestamp(seconds, 0)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    /// HS256 test token carrying `claims`.
    pub(crate) fn make_jwt(claims: &Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    #[test]
    fn reads_exp() {
        let token = make_jwt(&serde_json::json!({"sub": "x", "exp": 1_900_000_000}));
        assert_eq!(
            jwt_expiry(&token),
            DateTime::from_timestamp(1_900_000_000, 0)
        );
    }

    #[test]
    fn expired_token_still_reports_exp() {
        let token = make_jwt(&serde_json::json!({"exp": 1_000_000_000}));
        assert_eq!(jwt_expiry(&token), DateTime::from_timestamp(1_000_000_000, 0));
    }

    #[test]
    fn string_exp_is_accepted() {
        let token = make_jwt(&serde_json::json!({"exp": "1900000000"}));
        assert!(jwt_expiry(&token).is_some());
    }

    #[test]
    fn missing_exp() {
        let token = make_jwt(&serde_json::json!({"sub": "x"}));
        assert_eq!(jwt_expiry(&token), None);
    }

    #[test]
    fn opaque_tokens_have_no_expiry() {
        assert_eq!(jwt_expiry("not-a-jwt"), None);
        assert_eq!(jwt_expiry("a.b"), None);
        assert_eq!(jwt_expiry("a.!!!.c"), None);
        assert_eq!(jwt_expiry("a.b.c.d"), None);
    }
}
