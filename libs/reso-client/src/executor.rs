//! Authenticated GET with failure classification and bounded retries.

use std::time::Duration;

use reso_auth::BearerSource;
use reso_http::{HttpClient, HttpError, StatusCode};
use serde_json::Value;
use url::Url;

use crate::config::RetryPolicy;
use crate::error::{ClientError, FailureReason};
use crate::pager::Page;
use crate::query::ODataParams;

/// A decoded response body.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Json(Value),
    /// A body that is not JSON, e.g. the `$metadata` XML document.
    Text(String),
    /// The decoded URL a `$debug` request would have fetched.
    Debug(String),
}

impl Payload {
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) | Payload::Debug(_) => None,
        }
    }

    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) | Payload::Debug(_) => None,
        }
    }

    /// The body as text: the raw text, the debug URL, or serialized JSON.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Payload::Json(value) => value.to_string(),
            Payload::Text(text) | Payload::Debug(text) => text,
        }
    }

    /// The `value` page of a collection response; empty for anything else.
    #[must_use]
    pub fn into_page(self) -> Page<Value> {
        match self {
            Payload::Json(value) => Page::from_json(&value),
            Payload::Text(_) | Payload::Debug(_) => Page::new(Vec::new(), None),
        }
    }
}

/// Result of one attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success(Payload),
    Retryable(FailureReason),
    Fatal(FailureReason),
}

/// Classify a response.
///
/// Body rules come first: a text body mentioning `Bad Gateway` or
/// `Unauthorized`, a JSON object with an `error` member, a JSON object with a
/// `retry-after` member (seconds). Then status rules: 401, 429 (using the
/// `Retry-After` header when present), 408, 5xx are retryable; any other
/// non-2xx status is fatal. Everything else, including non-JSON text, is a
/// success.
#[must_use]
pub fn classify(status: StatusCode, retry_after: Option<Duration>, payload: Payload) -> Outcome {
    if status == StatusCode::UNAUTHORIZED {
        return Outcome::Retryable(FailureReason::Unauthorized);
    }

    match &payload {
        Payload::Text(text) if text.contains("Bad Gateway") => {
            return Outcome::Retryable(FailureReason::BadGateway);
        }
        Payload::Text(text) if text.contains("Unauthorized") => {
            return Outcome::Retryable(FailureReason::Unauthorized);
        }
        Payload::Json(Value::Object(body)) => {
            if let Some(error) = body.get("error") {
                if mentions_unauthorized(error) {
                    return Outcome::Retryable(FailureReason::Unauthorized);
                }
                return Outcome::Retryable(FailureReason::Upstream(error_summary(error)));
            }
            if let Some(secs) = body.get("retry-after") {
                return Outcome::Retryable(FailureReason::RetryAfter(Duration::from_secs(
                    retry_after_secs(secs),
                )));
            }
        }
        _ => {}
    }

    if status.is_success() {
        return Outcome::Success(payload);
    }
    match status {
        StatusCode::TOO_MANY_REQUESTS => Outcome::Retryable(
            retry_after.map_or_else(|| status_failure(status), FailureReason::RetryAfter),
        ),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Outcome::Retryable(FailureReason::BadGateway)
        }
        StatusCode::REQUEST_TIMEOUT => Outcome::Retryable(FailureReason::Timeout),
        s if s.is_server_error() => Outcome::Retryable(status_failure(s)),
        s if s.is_client_error() => Outcome::Fatal(status_failure(s)),
        _ => Outcome::Success(payload),
    }
}

fn status_failure(status: StatusCode) -> FailureReason {
    FailureReason::Upstream(format!("HTTP {status}"))
}

fn mentions_unauthorized(error: &Value) -> bool {
    let texts = [
        error.as_str(),
        error.get("code").and_then(Value::as_str),
        error.get("message").and_then(Value::as_str),
    ];
    texts.into_iter().flatten().any(|t| t.contains("Unauthorized"))
}

fn error_summary(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| other.to_string(), str::to_owned),
    }
}

/// Non-numeric values count as zero.
fn retry_after_secs(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .unwrap_or(0)
}

/// Transport failures worth retrying; anything else means the request
/// itself is wrong.
fn classify_transport(err: HttpError) -> Result<Outcome, ClientError> {
    if !err.is_transient() {
        return Err(ClientError::Http(err));
    }
    let reason = match err {
        HttpError::Timeout(_) => FailureReason::Timeout,
        HttpError::Transport(e) | HttpError::Tls(e) => FailureReason::Transport(e.to_string()),
        other => FailureReason::Transport(other.to_string()),
    };
    Ok(Outcome::Retryable(reason))
}

/// Sends requests for a client: URL assembly, bearer auth, classification
/// and the retry loop.
#[derive(Debug)]
pub struct Executor {
    http: HttpClient,
    base_url: String,
    bearer: BearerSource,
    retry: RetryPolicy,
}

impl Executor {
    pub fn new(http: HttpClient, base_url: &Url, bearer: BearerSource, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_owned(),
            bearer,
            retry,
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Absolute URL for `endpoint` with `params` appended.
    ///
    /// An absolute `endpoint` (a `nextLink`) is used as is; anything else is
    /// appended to the base URL. Parameters are merged into an existing
    /// query string.
    #[must_use]
    pub fn url_for(&self, endpoint: &str, params: &ODataParams) -> String {
        let mut url = match Url::parse(endpoint) {
            Ok(parsed) if parsed.has_host() => endpoint.to_owned(),
            _ if endpoint.starts_with('/') => format!("{}{endpoint}", self.base_url),
            _ => format!("{}/{endpoint}", self.base_url),
        };

        let query = params.to_query_string();
        if !query.is_empty() {
            let separator = match url.split_once('?') {
                Some((_, existing)) if !existing.is_empty() => Some('&'),
                Some(_) => None,
                None => Some('?'),
            };
            url.extend(separator);
            url.push_str(&query);
        }
        url
    }

    /// [`execute_with_retries`](Self::execute_with_retries) with the
    /// configured retry budget.
    ///
    /// # Errors
    ///
    /// As [`execute_with_retries`](Self::execute_with_retries).
    pub async fn execute(&self, endpoint: &str, params: &ODataParams) -> Result<Payload, ClientError> {
        self.execute_with_retries(endpoint, params, self.retry.max_retries)
            .await
    }

    /// GET `endpoint`, retrying retryable failures up to `max_retries`
    /// times with the configured delay between attempts.
    ///
    /// An unauthorized response forces a token refresh before the next
    /// attempt; a server-requested back-off is slept in addition to the
    /// delay. With `$debug` set, returns [`Payload::Debug`] without sending
    /// anything.
    ///
    /// # Errors
    ///
    /// [`ClientError::RetriesExhausted`] carrying the last failure,
    /// [`ClientError::Rejected`] for a non-retryable status,
    /// [`ClientError::Http`] for a request that cannot be sent.
    pub async fn execute_with_retries(
        &self,
        endpoint: &str,
        params: &ODataParams,
        max_retries: u32,
    ) -> Result<Payload, ClientError> {
        let url = self.url_for(endpoint, params);
        if params.is_debug() {
            return Ok(Payload::Debug(decode_url(&url)));
        }

        let attempts = max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            tracing::debug!(url = %url, attempt, "GET");
            let reason = match self.attempt(&url).await? {
                Outcome::Success(payload) => return Ok(payload),
                Outcome::Fatal(reason) => {
                    tracing::warn!(url = %url, %reason, "request rejected");
                    return Err(ClientError::Rejected(reason));
                }
                Outcome::Retryable(reason) => reason,
            };

            if attempt >= attempts {
                tracing::warn!(url = %url, attempts, %reason, "retries exhausted");
                return Err(ClientError::RetriesExhausted { attempts, reason });
            }

            if reason == FailureReason::Unauthorized
                && let Err(e) = self.bearer.refresh().await
            {
                tracing::warn!(error = %e, "token refresh after unauthorized response failed");
            }

            tracing::warn!(url = %url, attempt, %reason, "retrying request");
            if let FailureReason::RetryAfter(wait) = reason {
                tokio::time::sleep(wait).await;
            }
            tokio::time::sleep(self.retry.delay).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, url: &str) -> Result<Outcome, ClientError> {
        let token = match self.bearer.token().await {
            Ok(token) => token,
            Err(e) => return Ok(Outcome::Retryable(FailureReason::TokenRefresh(e.to_string()))),
        };

        let response = match self.http.get(url).bearer_auth(token.expose()).send().await {
            Ok(response) => response,
            Err(e) => return classify_transport(e),
        };
        let status = response.status();
        let retry_after = response.retry_after();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return classify_transport(e),
        };

        let payload = match serde_json::from_str::<Value>(&body) {
            Ok(json) => Payload::Json(json),
            Err(_) => Payload::Text(body),
        };
        Ok(classify(status, retry_after, payload))
    }
}

pub(crate) fn decode_url(url: &str) -> String {
    urlencoding::decode(url).map_or_else(|_| url.to_owned(), std::borrow::Cow::into_owned)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(payload: Payload) -> Outcome {
        classify(StatusCode::OK, None, payload)
    }

    fn executor(base: &str) -> Executor {
        Executor::new(
            HttpClient::builder()
                .allow_insecure_http()
                .build()
                .unwrap(),
            &Url::parse(base).unwrap(),
            BearerSource::Static("tok".into()),
            RetryPolicy::default(),
        )
    }

    #[test]
    fn body_rules() {
        assert_eq!(
            ok(Payload::Text("<h1>502 Bad Gateway</h1>".into())),
            Outcome::Retryable(FailureReason::BadGateway)
        );
        assert_eq!(
            ok(Payload::Text("401 Unauthorized".into())),
            Outcome::Retryable(FailureReason::Unauthorized)
        );
        assert_eq!(
            ok(Payload::Json(json!({"error": {"code": "Unauthorized", "message": "expired"}}))),
            Outcome::Retryable(FailureReason::Unauthorized)
        );
        assert_eq!(
            ok(Payload::Json(json!({"error": {"message": "Invalid $filter"}}))),
            Outcome::Retryable(FailureReason::Upstream("Invalid $filter".into()))
        );
        assert_eq!(
            ok(Payload::Json(json!({"retry-after": "3"}))),
            Outcome::Retryable(FailureReason::RetryAfter(Duration::from_secs(3)))
        );
        assert_eq!(
            ok(Payload::Json(json!({"retry-after": "soon"}))),
            Outcome::Retryable(FailureReason::RetryAfter(Duration::ZERO))
        );
    }

    #[test]
    fn non_json_text_is_success() {
        let xml = Payload::Text("<edmx:Edmx/>".into());
        assert_eq!(ok(xml.clone()), Outcome::Success(xml));
        let page = Payload::Json(json!({"value": []}));
        assert_eq!(ok(page.clone()), Outcome::Success(page));
    }

    #[test]
    fn status_rules() {
        let text = || Payload::Text(String::new());
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, None, Payload::Json(json!({}))),
            Outcome::Retryable(FailureReason::Unauthorized)
        );
        assert_eq!(
            classify(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(2)), text()),
            Outcome::Retryable(FailureReason::RetryAfter(Duration::from_secs(2)))
        );
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, None, text()),
            Outcome::Retryable(FailureReason::Upstream(_))
        ));
        assert_eq!(
            classify(StatusCode::SERVICE_UNAVAILABLE, None, text()),
            Outcome::Retryable(FailureReason::BadGateway)
        );
        assert_eq!(
            classify(StatusCode::REQUEST_TIMEOUT, None, text()),
            Outcome::Retryable(FailureReason::Timeout)
        );
        assert_eq!(
            classify(StatusCode::NOT_FOUND, None, text()),
            Outcome::Fatal(FailureReason::Upstream("HTTP 404 Not Found".into()))
        );
    }

    #[test]
    fn transport_failures_follow_http_transience() {
        let io = || Box::new(std::io::Error::other("connection reset"));
        assert_eq!(
            classify_transport(HttpError::Timeout(Duration::from_secs(1))).unwrap(),
            Outcome::Retryable(FailureReason::Timeout)
        );
        assert_eq!(
            classify_transport(HttpError::Transport(io())).unwrap(),
            Outcome::Retryable(FailureReason::Transport("connection reset".into()))
        );
        assert!(matches!(
            classify_transport(HttpError::Tls(io())),
            Ok(Outcome::Retryable(FailureReason::Transport(_)))
        ));
        assert!(matches!(
            classify_transport(HttpError::BodyTooLarge {
                limit: 1,
                actual: 2
            }),
            Err(ClientError::Http(HttpError::BodyTooLarge { .. }))
        ));
    }

    #[test]
    fn url_joins_relative_endpoints() {
        let exec = executor("https://api.example.com/reso/odata/");
        assert_eq!(
            exec.url_for("/Property", &ODataParams::new()),
            "https://api.example.com/reso/odata/Property"
        );
        assert_eq!(
            exec.url_for("Member", &ODataParams::new().set("$top", "1")),
            "https://api.example.com/reso/odata/Member?$top=1"
        );
    }

    #[test]
    fn url_keeps_absolute_links_and_merges_queries() {
        let exec = executor("https://api.example.com/reso/odata");
        let next = "https://api.example.com/reso/odata/Property?$skiptoken=abc";
        assert_eq!(exec.url_for(next, &ODataParams::new()), next);
        assert_eq!(
            exec.url_for(next, &ODataParams::new().set("$top", "5")),
            "https://api.example.com/reso/odata/Property?$skiptoken=abc&$top=5"
        );
    }

    #[tokio::test]
    async fn debug_returns_decoded_url_without_sending() {
        let exec = executor("https://api.example.com/odata");
        let params = ODataParams::new()
            .set("$filter", "City eq 'Seattle'")
            .debug(true);
        let payload = exec.execute("/Property", &params).await.unwrap();
        assert_eq!(
            payload,
            Payload::Debug("https://api.example.com/odata/Property?$filter=City eq 'Seattle'".into())
        );
    }

    #[test]
    fn payload_page_accessors() {
        let page = Payload::Json(json!({"value": [1, 2]})).into_page();
        assert_eq!(page.items.len(), 2);
        assert!(Payload::Text("x".into()).into_page().items.is_empty());
        assert_eq!(Payload::Debug("u".into()).into_text(), "u");
    }
}
