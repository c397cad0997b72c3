use std::time::Duration;

use reso_auth::TokenError;
use reso_http::HttpError;
use reso_odata::ConditionError;
use thiserror::Error;

/// Invalid or incomplete client configuration. Raised by
/// [`ClientConfigBuilder::build`](crate::ClientConfigBuilder::build) before
/// any I/O.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Missing {} `{field}`", field_label(.field))]
    Missing { field: &'static str },

    #[error("Invalid URL for `{field}`: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    /// The settings document could not be extracted.
    #[error("invalid settings: {0}")]
    Settings(String),
}

fn field_label(field: &str) -> &'static str {
    match field {
        "client_id" => "Client ID",
        "client_secret" => "Client Secret",
        "auth_url" => "Authentication URL",
        "base_url" => "API Base URL",
        _ => "setting",
    }
}

/// Why a single request attempt failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FailureReason {
    #[error("Bad Gateway")]
    BadGateway,

    /// The server rejected the bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// The server answered with an error document or an error status.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The server asked to back off for this long.
    #[error("rate limited, retry after {0:?}")]
    RetryAfter(Duration),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    /// No bearer token could be obtained.
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),
}

/// Errors returned by terminal query operations and client calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// A request that could not be sent at all (bad URL, bad header).
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// The server rejected the request in a way retrying cannot fix.
    #[error("request rejected: {0}")]
    Rejected(FailureReason),

    /// Every attempt failed; `reason` is the failure of the last one.
    #[error("request failed after {attempts} attempt(s): {reason}")]
    RetriesExhausted { attempts: u32, reason: FailureReason },

    /// `$metadata` was not an EDM XML document.
    #[error("invalid metadata document: {0}")]
    Metadata(String),
}

impl ClientError {
    /// The classified failure behind a failed request, if any.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Rejected(reason) | Self::RetriesExhausted { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn missing_field_messages_name_the_field() {
        let cases = [
            ("client_id", "Missing Client ID `client_id`"),
            ("client_secret", "Missing Client Secret `client_secret`"),
            ("auth_url", "Missing Authentication URL `auth_url`"),
            ("base_url", "Missing API Base URL `base_url`"),
        ];
        for (field, expected) in cases {
            assert_eq!(ConfigError::Missing { field }.to_string(), expected);
        }
    }

    #[test]
    fn exhausted_error_carries_reason() {
        let err = ClientError::RetriesExhausted {
            attempts: 6,
            reason: FailureReason::BadGateway,
        };
        assert_eq!(err.to_string(), "request failed after 6 attempt(s): Bad Gateway");
        assert_eq!(err.failure_reason(), Some(&FailureReason::BadGateway));
    }

    #[test]
    fn condition_errors_convert() {
        let err: ClientError = ConditionError::UnknownOperator("=~".into()).into();
        assert!(matches!(err, ClientError::Condition(_)));
        assert_eq!(err.failure_reason(), None);
    }
}
