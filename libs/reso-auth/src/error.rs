use thiserror::Error;

/// Errors from the client-credentials flow and the token cache.
///
/// No variant ever carries a client secret or an access token.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenError {
    /// Transport or status failure talking to the token endpoint.
    #[error("{0}")]
    Http(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("unsupported token type: {0}")]
    UnsupportedTokenType(String),

    #[error("OAuth2 config error: {0}")]
    ConfigError(String),

    /// Writing the persisted token failed. Reads never fail: an unreadable
    /// entry is a cache miss.
    #[error("token cache error: {0}")]
    Cache(String),
}

/// Render an HTTP error for the token endpoint without leaking request
/// bodies (which carry the client secret in `Form` mode).
pub(crate) fn describe_http_error(err: &reso_http::HttpError) -> String {
    match err {
        reso_http::HttpError::HttpStatus { status, .. } => {
            format!("OAuth2 token HTTP {status}")
        }
        reso_http::HttpError::Timeout(d) => format!("OAuth2 token request timed out after {d:?}"),
        other => format!("OAuth2 token request failed: {other}"),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn renders() {
        assert_eq!(
            TokenError::ConfigError("client_id must not be empty".into()).to_string(),
            "OAuth2 config error: client_id must not be empty"
        );
        assert_eq!(
            TokenError::UnsupportedTokenType("mac".into()).to_string(),
            "unsupported token type: mac"
        );
    }

    #[test]
    fn status_errors_omit_body() {
        let err = reso_http::HttpError::HttpStatus {
            status: http_status(401),
            body_preview: "client_secret=leak".into(),
            retry_after: None,
        };
        let msg = describe_http_error(&err);
        assert!(msg.contains("401"));
        assert!(!msg.contains("leak"));
    }

    fn http_status(code: u16) -> reso_http::StatusCode {
        reso_http::StatusCode::from_u16(code).unwrap()
    }
}
