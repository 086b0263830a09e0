//! One object that owns every collaborator of a signed-in client.
//!
//! Nothing here is global: each [`Client`] carries its own session, stores and
//! transport, so several clients (one per server-side request, for example)
//! can coexist in the same process.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::dashboard::DashboardStore;
use crate::error::Error;
use crate::guard::RouteGuards;
use crate::http::{ApiClient, ReqwestTransport, Transport, TransportDyn};
use crate::navigation::{LogNavigator, Navigator};
use crate::notify::{AlertCenter, NotificationSink};
use crate::payment::PaymentStore;
use crate::session::{SessionContext, SessionManager};
use crate::storage::{CookieStore, KeyValueStore, MemoryStore, Persistence};

/// Wires config, transport, storage backends, notifications and navigation.
///
/// Every `with_*` override is optional:
///
/// | Collaborator | Default |
/// |---|---|
/// | transport | [`ReqwestTransport`] |
/// | cookie store | [`CookieStore`] honoring `secure_cookies` |
/// | local store | [`MemoryStore`] |
/// | notifier | [`AlertCenter`] (reachable through [`Client::alerts`]) |
/// | navigator | [`LogNavigator`] |
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn TransportDyn>>,
    cookies: Option<Arc<dyn KeyValueStore>>,
    local: Option<Arc<dyn KeyValueStore>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl ClientBuilder {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            cookies: None,
            local: None,
            notifier: None,
            navigator: None,
        }
    }

    #[must_use]
    pub fn with_transport<T: Transport>(mut self, transport: Arc<T>) -> Self {
        let transport: Arc<dyn TransportDyn> = transport;
        self.transport = Some(transport);
        self
    }

    /// Authoritative backend. Keep the `Arc` to read pending `Set-Cookie`s.
    #[must_use]
    pub fn with_cookie_store<S: KeyValueStore>(mut self, store: Arc<S>) -> Self {
        let store: Arc<dyn KeyValueStore> = store;
        self.cookies = Some(store);
        self
    }

    #[must_use]
    pub fn with_local_store<S: KeyValueStore>(mut self, store: Arc<S>) -> Self {
        let store: Arc<dyn KeyValueStore> = store;
        self.local = Some(store);
        self
    }

    /// Replaces the bundled [`AlertCenter`].
    #[must_use]
    pub fn with_notifier<N: NotificationSink>(mut self, notifier: Arc<N>) -> Self {
        let notifier: Arc<dyn NotificationSink> = notifier;
        self.notifier = Some(notifier);
        self
    }

    #[must_use]
    pub fn with_navigator<N: Navigator>(mut self, navigator: Arc<N>) -> Self {
        let navigator: Arc<dyn Navigator> = navigator;
        self.navigator = Some(navigator);
        self
    }

    #[must_use]
    pub fn build(self) -> Client {
        let config = self.config;

        let cookies = self
            .cookies
            .unwrap_or_else(|| Arc::new(CookieStore::new(config.secure_cookies)));
        let local = self
            .local
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(LogNavigator));

        let (notifier, alerts) = match self.notifier {
            Some(notifier) => (notifier, None),
            None => {
                let center = AlertCenter::new();
                let notifier: Arc<dyn NotificationSink> = Arc::new(center.clone());
                (notifier, Some(center))
            }
        };

        let persistence = Persistence::new(&config, cookies, local);
        let context = Arc::new(SessionContext::new(
            &config,
            persistence,
            notifier,
            Arc::clone(&navigator),
        ));

        let api = ApiClient::new(&config, transport, Arc::clone(&context));
        let session = SessionManager::new(api.clone(), context);
        let guards = RouteGuards::new(&config, session.clone(), navigator);
        let dashboard = DashboardStore::new(api.clone());
        let payments = PaymentStore::new(api.clone());

        tracing::debug!(
            base_url = %config.base_url,
            context = ?config.execution_context,
            "Client assembled"
        );

        Client {
            config,
            api,
            session,
            guards,
            dashboard,
            payments,
            alerts,
        }
    }
}

/// Session, HTTP pipeline, route guards and view-model stores sharing one
/// auth state.
///
/// Cloning is cheap; clones share everything.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    api: ApiClient,
    session: SessionManager,
    guards: RouteGuards,
    dashboard: DashboardStore,
    payments: PaymentStore,
    alerts: Option<AlertCenter>,
}

impl Client {
    /// Client with every default collaborator.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        ClientBuilder::new(config).build()
    }

    #[must_use]
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Client configured from `BILLPAY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the environment is incomplete or invalid.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    #[must_use]
    pub fn guards(&self) -> &RouteGuards {
        &self.guards
    }

    #[must_use]
    pub fn dashboard(&self) -> &DashboardStore {
        &self.dashboard
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentStore {
        &self.payments
    }

    /// The bundled alert queue, or `None` when a custom notifier was supplied.
    #[must_use]
    pub fn alerts(&self) -> Option<&AlertCenter> {
        self.alerts.as_ref()
    }
}
