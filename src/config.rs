use time::Duration;
use url::Url;

use crate::error::Error;
use crate::storage::ExecutionContext;
use crate::token::EXPIRY_BUFFER;

/// BillPay client configuration.
///
/// The API base URL is the only required field. Everything else has a default
/// and can be overridden with `with_*` methods.
///
/// ```rust,ignore
/// use billpay_client::ClientConfig;
///
/// let config = ClientConfig::new("https://api.billpay.example/api/v1".parse()?)
///     .with_execution_context(ExecutionContext::Server)
///     .with_secure_cookies(false);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) execution_context: ExecutionContext,
    pub(crate) secure_cookies: bool,
    pub(crate) token_ttl: Duration,
    pub(crate) refresh_token_ttl: Duration,
    pub(crate) expiry_buffer: Duration,
    pub(crate) entry_route: String,
    pub(crate) login_redirect: String,
    pub(crate) logout_redirect: String,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            execution_context: ExecutionContext::Client,
            secure_cookies: true,
            token_ttl: Duration::days(7),
            refresh_token_ttl: Duration::days(30),
            expiry_buffer: EXPIRY_BUFFER,
            entry_route: "/".into(),
            login_redirect: "/dashboard".into(),
            logout_redirect: "/login".into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `BILLPAY_BASE_URL`: API base URL (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `BILLPAY_EXECUTION_CONTEXT`: `client` (default) or `server`
    /// - `BILLPAY_SECURE_COOKIES`: `0`/`false` to allow cookies over plain HTTP
    /// - `BILLPAY_ENTRY_ROUTE`: where unauthenticated users are sent
    /// - `BILLPAY_LOGIN_REDIRECT`: where authenticated guests are sent
    /// - `BILLPAY_LOGOUT_REDIRECT`: where logout navigates
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base_url_str =
            var("BILLPAY_BASE_URL").ok_or_else(|| Error::Config("BILLPAY_BASE_URL is required".into()))?;
        let base_url: Url = base_url_str
            .parse()
            .map_err(|e| Error::Config(format!("BILLPAY_BASE_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Some(context) = var("BILLPAY_EXECUTION_CONTEXT") {
            config = config.with_execution_context(match context.trim() {
                "client" => ExecutionContext::Client,
                "server" => ExecutionContext::Server,
                other => {
                    return Err(Error::Config(format!(
                        "BILLPAY_EXECUTION_CONTEXT: expected 'client' or 'server', got '{other}'"
                    )));
                }
            });
        }
        if let Some(secure) = var("BILLPAY_SECURE_COOKIES") {
            config = config.with_secure_cookies(!matches!(secure.trim(), "0" | "false"));
        }
        if let Some(route) = var("BILLPAY_ENTRY_ROUTE") {
            config = config.with_entry_route(route);
        }
        if let Some(route) = var("BILLPAY_LOGIN_REDIRECT") {
            config = config.with_login_redirect(route);
        }
        if let Some(route) = var("BILLPAY_LOGOUT_REDIRECT") {
            config = config.with_logout_redirect(route);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_execution_context(mut self, context: ExecutionContext) -> Self {
        self.execution_context = context;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// Cookie max-age for the access token and user record (default: 7 days).
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Cookie max-age for the refresh token (default: 30 days).
    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    /// How long before `exp` a token counts as expired (default: 5 minutes).
    #[must_use]
    pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = buffer;
        self
    }

    #[must_use]
    pub fn with_entry_route(mut self, route: impl Into<String>) -> Self {
        self.entry_route = route.into();
        self
    }

    #[must_use]
    pub fn with_login_redirect(mut self, route: impl Into<String>) -> Self {
        self.login_redirect = route.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, route: impl Into<String>) -> Self {
        self.logout_redirect = route.into();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn execution_context(&self) -> ExecutionContext {
        self.execution_context
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    #[must_use]
    pub fn expiry_buffer(&self) -> Duration {
        self.expiry_buffer
    }

    #[must_use]
    pub fn entry_route(&self) -> &str {
        &self.entry_route
    }

    #[must_use]
    pub fn login_redirect(&self) -> &str {
        &self.login_redirect
    }

    #[must_use]
    pub fn logout_redirect(&self) -> &str {
        &self.logout_redirect
    }
}
