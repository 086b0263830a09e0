use std::sync::Arc;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use url::Url;

use super::error::{Classified, Effect, NormalizedError, classify_network_failure, classify_status};
use super::transport::{HttpRequest, HttpResponse, MultipartForm, RequestBody, TransportDyn};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::notify::Notification;
use crate::session::SessionContext;
use crate::types::ApiResponse;

/// Content types that always resolve as raw bytes, whatever the status.
const BINARY_CONTENT_TYPES: [&str; 3] = [
    "spreadsheetml",
    "application/octet-stream",
    "application/pdf",
];

/// Request body.
#[derive(Debug, Clone)]
pub enum Body {
    Json(JsonValue),
    /// Sent without an explicit `Content-Type` so the boundary is generated.
    Multipart(MultipartForm),
}

impl Body {
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `value` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }
}

/// Successful response body after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(JsonValue),
    Binary { content_type: String, bytes: Bytes },
    /// 204, non-JSON content, or a body that failed to parse.
    Empty,
}

impl Payload {
    /// JSON value of the payload; `Null` for empty and binary payloads.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        match self {
            Self::Json(value) => value,
            Self::Binary { .. } | Self::Empty => JsonValue::Null,
        }
    }

    #[must_use]
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Self::Binary { bytes, .. } => Some(bytes),
            Self::Json(_) | Self::Empty => None,
        }
    }
}

/// Auth-aware HTTP pipeline.
///
/// Every failure is normalized into a [`NormalizedError`] and reported to the
/// notification sink exactly once. A 401 while a user is signed in clears the
/// session.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    transport: Arc<dyn TransportDyn>,
    session: Arc<SessionContext>,
}

impl ApiClient {
    pub(crate) fn new(
        config: &ClientConfig,
        transport: Arc<dyn TransportDyn>,
        session: Arc<SessionContext>,
    ) -> Self {
        Self {
            base_url: config.base_url.clone(),
            transport,
            session,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Reports through the same sink the pipeline uses.
    pub(crate) fn notify(&self, notification: Notification) {
        self.session.notify(notification);
    }

    /// Sends a request and classifies the response.
    ///
    /// # Errors
    ///
    /// Returns a [`NormalizedError`] (already notified) for transport failures
    /// and non-2xx responses that are not binary downloads.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
    ) -> Result<Payload, NormalizedError> {
        let request = self.build(method, path, body)?;
        tracing::debug!(method = %request.method, url = %request.url, "Sending request");

        match self.transport.send_dyn(request).await {
            Ok(response) => self.classify(response),
            Err(e) => {
                tracing::warn!(error = %e, path = %path, "Request failed without a response");
                Err(self.apply(classify_network_failure()))
            }
        }
    }

    /// Sends a request and decodes the JSON envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] / [`Error::Http`] from the pipeline, or
    /// [`Error::Decode`] when the payload is not the expected envelope.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
    ) -> Result<ApiResponse<T>, Error> {
        match self.request(method, path, body).await? {
            Payload::Json(value) => serde_json::from_value::<ApiResponse<JsonValue>>(value)?.decode(),
            Payload::Empty => Err(Error::Decode(format!("empty response from {path}"))),
            Payload::Binary { content_type, .. } => Err(Error::Decode(format!(
                "unexpected binary response ({content_type}) from {path}"
            ))),
        }
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, Error> {
        self.send(Method::GET, path, None).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Body>,
    ) -> Result<ApiResponse<T>, Error> {
        self.send(Method::POST, path, body).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Body>,
    ) -> Result<ApiResponse<T>, Error> {
        self.send(Method::PUT, path, body).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Body>,
    ) -> Result<ApiResponse<T>, Error> {
        self.send(Method::PATCH, path, body).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, Error> {
        self.send(Method::DELETE, path, None).await
    }

    /// Fetches a binary payload. `None` when the server answered with JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] / [`Error::Http`] from the pipeline.
    pub async fn download(&self, path: &str) -> Result<Option<Bytes>, Error> {
        Ok(self.request(Method::GET, path, None).await?.into_bytes())
    }

    fn build(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
    ) -> Result<HttpRequest, NormalizedError> {
        let url = self.url(path)?;
        let mut headers = HeaderMap::new();

        if let Some(token) = self.session.bearer_token() {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Stored token is not a valid header value, sending without it"),
            }
        }

        let body = match body {
            None => None,
            Some(Body::Json(value)) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                let bytes = serde_json::to_vec(&value).map_err(|e| {
                    tracing::error!(error = %e, "Failed to serialize request body");
                    self.reject("Invalid request body")
                })?;
                Some(RequestBody::Json(Bytes::from(bytes)))
            }
            Some(Body::Multipart(form)) => Some(RequestBody::Multipart(form)),
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Joins `path` onto the base URL, keeping any base path prefix.
    fn url(&self, path: &str) -> Result<Url, NormalizedError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| {
            tracing::error!(error = %e, path = %path, "Invalid request URL");
            self.reject("Invalid request URL")
        })
    }

    /// Local failure before anything was sent.
    fn reject(&self, message: &str) -> NormalizedError {
        self.session.notify(Notification::error(message));
        NormalizedError::new(0, message)
    }

    fn classify(&self, response: HttpResponse) -> Result<Payload, NormalizedError> {
        let status = response.status.as_u16();
        let content_type = response.content_type().unwrap_or_default().to_owned();

        if BINARY_CONTENT_TYPES.iter().any(|t| content_type.contains(t)) {
            return Ok(Payload::Binary {
                content_type,
                bytes: response.body,
            });
        }

        let payload = if content_type.contains("application/json") && status != 204 {
            match serde_json::from_slice::<JsonValue>(&response.body) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(error = %e, status, "Response body is not valid JSON");
                    None
                }
            }
        } else {
            None
        };

        if response.status.is_success() {
            return Ok(payload.map_or(Payload::Empty, Payload::Json));
        }

        Err(self.apply(classify_status(status, payload, self.session.has_user())))
    }

    fn apply(&self, classified: Classified) -> NormalizedError {
        let Classified {
            error,
            notification,
            effect,
        } = classified;
        tracing::debug!(status = error.status_code, message = %error.message, "Request failed");

        self.session.notify(notification);
        match effect {
            Effect::None => {}
            Effect::ForceLogout => {
                tracing::info!("Unauthorized with an active session, logging out");
                self.session.logout();
            }
            Effect::NotFoundPage(message) => self.session.navigator().show_error_page(404, &message),
        }
        error
    }
}

/// Percent-encodes a single path segment.
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Appends non-empty query parameters to `path`.
pub(crate) fn with_query(path: &str, params: &[(&str, Option<String>)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| format!("{key}={}", urlencoding::encode(v)))
        })
        .collect();
    if query.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{}", query.join("&"))
    }
}
