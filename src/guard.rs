//! Route gates for authenticated-only and guest-only pages.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::navigation::Navigator;
use crate::session::SessionManager;
use crate::storage::ExecutionContext;

/// What the router should do with the navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Proceed,
    Redirect(String),
}

/// Result of [`RouteGuards::authenticated`].
///
/// `refresh` is set when the token was expired and a silent refresh started.
/// Navigation is not blocked on it; a failed refresh navigates to the entry route.
#[derive(Debug)]
#[non_exhaustive]
pub struct GuardDecision {
    pub outcome: GuardOutcome,
    pub refresh: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct RouteGuards {
    session: SessionManager,
    navigator: Arc<dyn Navigator>,
    context: ExecutionContext,
    entry_route: String,
    login_redirect: String,
}

impl RouteGuards {
    pub(crate) fn new(
        config: &ClientConfig,
        session: SessionManager,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            session,
            navigator,
            context: config.execution_context,
            entry_route: config.entry_route.clone(),
            login_redirect: config.login_redirect.clone(),
        }
    }

    /// Gate for pages that require a signed-in user.
    #[must_use]
    pub fn authenticated(&self) -> GuardDecision {
        self.restore_on_client();

        if !self.session.is_authenticated() {
            return GuardDecision {
                outcome: GuardOutcome::Redirect(self.entry_route.clone()),
                refresh: None,
            };
        }

        let refresh = if self.session.is_token_expired() {
            tracing::warn!("Token expired, attempting silent refresh");
            self.spawn_refresh()
        } else {
            None
        };

        GuardDecision {
            outcome: GuardOutcome::Proceed,
            refresh,
        }
    }

    /// Gate for login and registration pages.
    #[must_use]
    pub fn guest(&self) -> GuardOutcome {
        self.restore_on_client();

        if self.session.is_authenticated() && !self.session.is_token_expired() {
            GuardOutcome::Redirect(self.login_redirect.clone())
        } else {
            GuardOutcome::Proceed
        }
    }

    fn restore_on_client(&self) {
        if self.context.is_client() && !self.session.snapshot().is_logged_in {
            self.session.restore_auth();
        }
    }

    fn spawn_refresh(&self) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, skipping silent token refresh");
            return None;
        };

        let session = self.session.clone();
        let navigator = Arc::clone(&self.navigator);
        let entry_route = self.entry_route.clone();
        Some(runtime.spawn(async move {
            if let Err(e) = session.refresh_access_token().await {
                tracing::warn!(error = %e, "Silent refresh failed, leaving protected route");
                navigator.navigate(&entry_route);
            }
        }))
    }
}
