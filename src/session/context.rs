use std::sync::{Arc, PoisonError, RwLock};

use time::{Duration, OffsetDateTime};

use super::state::{AuthPhase, DEFAULT_TOKEN_TYPE, Session};
use crate::config::ClientConfig;
use crate::navigation::Navigator;
use crate::notify::{Notification, NotificationSink};
use crate::storage::{PersistedRecord, Persistence};
use crate::token;

/// State shared between the session manager and the HTTP pipeline.
///
/// The lock is never held across an await point.
pub(crate) struct SessionContext {
    state: RwLock<Session>,
    persistence: Persistence,
    notifier: Arc<dyn NotificationSink>,
    navigator: Arc<dyn Navigator>,
    expiry_buffer: Duration,
    logout_redirect: String,
}

impl SessionContext {
    pub(crate) fn new(
        config: &ClientConfig,
        persistence: Persistence,
        notifier: Arc<dyn NotificationSink>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            state: RwLock::new(Session::default()),
            persistence,
            notifier,
            navigator,
            expiry_buffer: config.expiry_buffer,
            logout_redirect: config.logout_redirect.clone(),
        }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub(crate) fn snapshot(&self) -> Session {
        self.read(Session::clone)
    }

    pub(crate) fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub(crate) fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    pub(crate) fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    /// In-memory token, else the persisted cookie token.
    pub(crate) fn bearer_token(&self) -> Option<String> {
        self.read(|s| (!s.access_token.is_empty()).then(|| s.access_token.clone()))
            .or_else(|| self.persistence.cookie_token())
    }

    pub(crate) fn has_user(&self) -> bool {
        self.read(|s| s.user.is_some())
    }

    pub(crate) fn is_token_expired(&self) -> bool {
        let token = self.read(|s| s.access_token.clone());
        token::is_expired_at(&token, OffsetDateTime::now_utc(), self.expiry_buffer)
    }

    /// Sets `loading` until the returned guard is dropped.
    pub(crate) fn begin_loading(&self) -> LoadingGuard<'_> {
        self.write(|s| s.loading = true);
        LoadingGuard { ctx: self }
    }

    /// Installs a freshly issued session and persists it.
    pub(crate) fn establish(&self, record: PersistedRecord, token_type: Option<String>) {
        self.write(|s| {
            s.access_token = record.access_token.clone();
            s.refresh_token = record.refresh_token.clone();
            s.token_type = token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned());
            s.user = Some(record.user.clone());
            s.is_logged_in = true;
            s.last_error = None;
            s.phase = AuthPhase::Authenticated;
        });
        self.persistence.save(&record);
    }

    /// Hydrates memory from persistence. Optimistic: expiry is not checked.
    ///
    /// A corrupt persisted record forces a logout.
    pub(crate) fn restore_auth(&self) -> bool {
        match self.persistence.load() {
            Ok(Some(record)) => {
                self.write(|s| {
                    s.access_token = record.access_token;
                    s.refresh_token = record.refresh_token;
                    s.user = Some(record.user);
                    s.is_logged_in = true;
                    s.phase = AuthPhase::Authenticated;
                });
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::error!(error = %e, "Failed to restore session");
                self.logout();
                false
            }
        }
    }

    /// Clears memory and both backends, then navigates away. Never fails.
    pub(crate) fn logout(&self) {
        self.write(Session::reset);
        self.persistence.clear();
        self.notify(Notification::success("Logged out successfully"));
        self.navigator.navigate(&self.logout_redirect);
        tracing::info!("Session cleared");
    }
}

pub(crate) struct LoadingGuard<'a> {
    ctx: &'a SessionContext,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.ctx.write(|s| s.loading = false);
    }
}
