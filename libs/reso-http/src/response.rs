use std::time::{Duration, SystemTime};

use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde::de::DeserializeOwned;

use crate::error::HttpError;

/// Error previews are cut at this many bytes.
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Parse a `Retry-After` header: delay-seconds or an HTTP-date.
///
/// Returns `None` when the header is missing, unparsable, negative, or a
/// date already in the past.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<i64>() {
        return u64::try_from(seconds).ok().map(Duration::from_secs);
    }

    let at = httpdate::parse_http_date(value).ok()?;
    at.duration_since(SystemTime::now()).ok()
}

/// A response whose body has not been read yet.
///
/// Every body read is capped at `max_body_size` and bounded by the client's
/// request timeout.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<Incoming>,
    pub(crate) max_body_size: usize,
    pub(crate) timeout: Duration,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// The parsed `Retry-After` header, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(self.inner.headers())
    }

    /// Fail on non-2xx without reading the body.
    ///
    /// # Errors
    ///
    /// `HttpError::HttpStatus` with an empty preview.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.inner.status().is_success() {
            return Ok(self);
        }
        Err(HttpError::HttpStatus {
            status: self.inner.status(),
            body_preview: String::new(),
            retry_after: self.retry_after(),
        })
    }

    /// Read the whole body regardless of status.
    ///
    /// # Errors
    ///
    /// `BodyTooLarge`, `Timeout`, or `Transport`.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        let limit = self.max_body_size;
        read_with_timeout(self.inner, limit, self.timeout).await
    }

    /// Read the body, failing on non-2xx with a preview of the body.
    ///
    /// # Errors
    ///
    /// `HttpStatus` for non-2xx, otherwise as [`bytes`](Self::bytes).
    pub async fn checked_bytes(self) -> Result<Bytes, HttpError> {
        let status = self.inner.status();
        if status.is_success() {
            return self.bytes().await;
        }

        let retry_after = self.retry_after();
        let preview_limit = self.max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
        let body_preview = match read_with_timeout(self.inner, preview_limit, self.timeout).await
        {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(HttpError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
            Err(e) => return Err(e),
        };
        Err(HttpError::HttpStatus {
            status,
            body_preview,
            retry_after,
        })
    }

    /// Parse a 2xx body as JSON.
    ///
    /// # Errors
    ///
    /// As [`checked_bytes`](Self::checked_bytes), plus `Json`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = self.checked_bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read the body as UTF-8 text (lossy) regardless of status.
    ///
    /// # Errors
    ///
    /// As [`bytes`](Self::bytes).
    pub async fn text(self) -> Result<String, HttpError> {
        let body = self.bytes().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

async fn read_with_timeout(
    response: Response<Incoming>,
    limit: usize,
    timeout: Duration,
) -> Result<Bytes, HttpError> {
    tokio::time::timeout(timeout, read_limited(response, limit))
        .await
        .map_err(|_| HttpError::Timeout(timeout))?
}

async fn read_limited(response: Response<Incoming>, limit: usize) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut collected = Vec::new();

    while let Some(frame) = body.frame().await {
        let frame = frame?;
        if let Some(chunk) = frame.data_ref() {
            let actual = collected.len() + chunk.len();
            if actual > limit {
                return Err(HttpError::BodyTooLarge { limit, actual });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::RETRY_AFTER, value.parse().unwrap());
        headers
    }

    #[test]
    fn retry_after_seconds() {
        assert_eq!(
            parse_retry_after(&headers_with("120")),
            Some(Duration::from_secs(120))
        );
        assert_eq!(
            parse_retry_after(&headers_with("  7 ")),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            parse_retry_after(&headers_with("0")),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn retry_after_rejects_garbage_and_negatives() {
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
        assert_eq!(parse_retry_after(&headers_with("soon")), None);
        assert_eq!(parse_retry_after(&headers_with("-5")), None);
    }

    #[test]
    fn retry_after_http_date() {
        assert_eq!(
            parse_retry_after(&headers_with("Wed, 21 Oct 2015 07:28:00 GMT")),
            None
        );

        let future = SystemTime::now() + Duration::from_secs(60);
        let parsed = parse_retry_after(&headers_with(&httpdate::fmt_http_date(future))).unwrap();
        assert!(parsed.as_secs() >= 58 && parsed.as_secs() <= 60);
    }
}
