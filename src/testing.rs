//! Scripted collaborators shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value as JsonValue, json};
use tokio::sync::Notify;

use crate::config::ClientConfig;
use crate::http::{ApiClient, HttpRequest, HttpResponse, Transport, TransportError};
use crate::navigation::Navigator;
use crate::notify::{Notification, NotificationSink};
use crate::session::{SessionContext, SessionManager};
use crate::storage::{CookieStore, MemoryStore, PersistedRecord, Persistence};
use crate::types::{User, UserId};

/// Token whose `exp` lies far in the future.
pub(crate) const LIVE_TOKEN: &str = "a.eyJleHAiOjk5OTk5OTk5OTl9.c";

pub(crate) fn expired_token() -> String {
    crate::token::token_with_claims(&json!({ "exp": 1_000_000_000 }))
}

pub(crate) fn test_user() -> User {
    User::new(UserId(9), "0780000000", "Jane Doe").with_email("jane@example.com")
}

pub(crate) fn signed_in_record() -> PersistedRecord {
    PersistedRecord {
        access_token: LIVE_TOKEN.into(),
        refresh_token: Some("refresh-1".into()),
        user: test_user(),
    }
}

/// Transport answering from a queue of scripted responses.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockTransport {
    /// Holds the next request in flight until the returned gate is notified.
    pub(crate) fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn push_json(&self, status: u16, body: JsonValue) {
        let bytes = serde_json::to_vec(&body).unwrap();
        self.push_response(status, Some("application/json"), Bytes::from(bytes));
    }

    pub(crate) fn push_raw(&self, status: u16, content_type: Option<&str>, body: &'static [u8]) {
        self.push_response(status, content_type, Bytes::from_static(body));
    }

    pub(crate) fn push_failure(&self) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(TransportError("connection refused".into())));
    }

    fn push_response(&self, status: u16, content_type: Option<&str>, body: Bytes) {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(ct).unwrap());
        }
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body,
        }));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// JSON body of the last request.
    pub(crate) fn last_json(&self) -> Option<JsonValue> {
        match self.last_request()?.body? {
            crate::http::RequestBody::Json(bytes) => serde_json::from_slice(&bytes).ok(),
            crate::http::RequestBody::Multipart(_) => None,
        }
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(TransportError("no scripted response".into())))
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    notes: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.notes.lock().unwrap().clone()
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.notifications().into_iter().map(|n| n.message).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notes.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
    error_pages: Mutex<Vec<(u16, String)>>,
}

impl RecordingNavigator {
    pub(crate) fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }

    pub(crate) fn error_pages(&self) -> Vec<(u16, String)> {
        self.error_pages.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_owned());
    }

    fn show_error_page(&self, status: u16, message: &str) {
        self.error_pages.lock().unwrap().push((status, message.to_owned()));
    }
}

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig::new("https://api.example.com/api".parse().unwrap())
}

/// Fully wired pipeline over scripted collaborators.
pub(crate) struct Harness {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<MockTransport>,
    pub(crate) cookies: Arc<CookieStore>,
    pub(crate) local: MemoryStore,
    pub(crate) sink: Arc<RecordingSink>,
    pub(crate) navigator: Arc<RecordingNavigator>,
    pub(crate) session: Arc<SessionContext>,
    pub(crate) api: ApiClient,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(test_config())
    }

    pub(crate) fn with_config(config: ClientConfig) -> Self {
        let transport = Arc::new(MockTransport::default());
        let cookies = Arc::new(CookieStore::new(true));
        let local = MemoryStore::new();
        let sink = Arc::new(RecordingSink::default());
        let navigator = Arc::new(RecordingNavigator::default());

        let persistence = Persistence::new(&config, cookies.clone(), Arc::new(local.clone()));
        let session = Arc::new(SessionContext::new(
            &config,
            persistence,
            sink.clone(),
            navigator.clone(),
        ));
        let api = ApiClient::new(&config, transport.clone(), session.clone());

        Self {
            config,
            transport,
            cookies,
            local,
            sink,
            navigator,
            session,
            api,
        }
    }

    pub(crate) fn manager(&self) -> SessionManager {
        SessionManager::new(self.api.clone(), self.session.clone())
    }

    /// Persists a live session without touching memory, as a previous visit would.
    pub(crate) fn seed_persisted_session(&self) {
        self.session.persistence().save(&signed_in_record());
    }
}
