use bytes::Bytes;
use http::Request;
use http::header::{HeaderName, HeaderValue};
use http_body_util::Full;

use crate::client::HttpClient;
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;

enum BodyKind {
    Empty,
    Form(Bytes),
}

/// Fluent request builder, created by [`HttpClient::get`] / [`HttpClient::post`].
///
/// Header errors are held until [`send`](RequestBuilder::send) so a chain
/// never has to stop halfway.
///
/// ```ignore
/// let resp = client
///     .post("https://auth.example.com/token")
///     .header("accept", "application/json")
///     .form(&[("grant_type", "client_credentials")])?
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    client: HttpClient,
    method: http::Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: BodyKind,
    error: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(client: HttpClient, method: http::Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: Vec::new(),
            body: BodyKind::Empty,
            error: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(HttpError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// `Authorization: Bearer <token>`, marked sensitive so it never shows
    /// up in debug output.
    pub fn bearer_auth(mut self, token: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match HeaderValue::try_from(format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.push((http::header::AUTHORIZATION, value));
            }
            Err(e) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Form-encode `fields` as the body.
    ///
    /// # Errors
    ///
    /// A deferred header error, or `FormEncode`.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let encoded = serde_urlencoded::to_string(fields)?;
        self.body = BodyKind::Form(Bytes::from(encoded));
        Ok(self)
    }

    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let uri: http::Uri = self
            .url
            .parse()
            .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") if self.client.transport_security == TransportSecurity::AllowInsecureHttp => {
                Ok(uri)
            }
            Some("http") => Err(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "HTTPS required".to_owned(),
            }),
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// are supported".to_owned(),
            }),
            None => Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingScheme,
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    /// Send the request. Any status, including 4xx/5xx, is `Ok`.
    ///
    /// # Errors
    ///
    /// A deferred builder error, an invalid URL, `Timeout`, or `Transport`.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let uri = self.validate_url()?;

        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .header(http::header::USER_AGENT, self.client.user_agent.clone());

        let has_content_type = self
            .headers
            .iter()
            .any(|(name, _)| name == http::header::CONTENT_TYPE);
        if !has_content_type && matches!(self.body, BodyKind::Form(_)) {
            builder = builder.header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            );
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let body = match self.body {
            BodyKind::Empty => Bytes::new(),
            BodyKind::Form(b) => b,
        };
        let request = builder.body(Full::new(body))?;

        tracing::debug!(method = %self.method, url = %self.url, "sending request");

        let timeout = self.client.timeout;
        let inner = match tokio::time::timeout(timeout, self.client.inner.request(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(HttpError::Timeout(timeout)),
        };

        Ok(HttpResponse {
            inner,
            max_body_size: self.client.max_body_size,
            timeout,
        })
    }
}
