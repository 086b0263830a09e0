//! Session persistence across two key-value backends.
//!
//! The cookie backend is authoritative and works during server rendering.
//! The local backend is a client-only cache of the same three fields.
//!
//! Writes are two-phase and non-transactional: cookie first, local second.
//! Concurrent writers are last-writer-wins per key. A crash between the two
//! phases leaves the local cache stale, which is harmless because
//! [`Persistence::load`] always prefers the cookie backend.

mod cookie;
mod memory;

use std::fmt;
use std::sync::Arc;

use time::Duration;

pub use cookie::CookieStore;
pub use memory::MemoryStore;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::types::User;

/// Cookie keys.
pub const TOKEN_COOKIE: &str = "token";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub const USER_COOKIE: &str = "user";

/// Local-storage keys.
pub const TOKEN_LOCAL_KEY: &str = "auth_token";
pub const REFRESH_TOKEN_LOCAL_KEY: &str = "refresh_token";
pub const USER_LOCAL_KEY: &str = "user_data";

/// Opaque string key-value backend (cookies, browser local storage, ...).
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`. Backends without expiry ignore `max_age`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend rejects the write.
    fn set(&self, key: &str, value: &str, max_age: Option<Duration>) -> Result<(), Error>;

    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backend rejects the removal.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Where the code is running. Local storage exists only on the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionContext {
    Server,
    #[default]
    Client,
}

impl ExecutionContext {
    #[must_use]
    pub fn is_client(self) -> bool {
        self == Self::Client
    }
}

/// The persisted subset of a session.
#[derive(Clone, PartialEq)]
pub struct PersistedRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: User,
}

impl fmt::Debug for PersistedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedRecord")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user)
            .finish()
    }
}

/// Reads and writes session fields to the cookie and local backends.
pub struct Persistence {
    cookies: Arc<dyn KeyValueStore>,
    local: Arc<dyn KeyValueStore>,
    context: ExecutionContext,
    token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl Persistence {
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        cookies: Arc<dyn KeyValueStore>,
        local: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            cookies,
            local,
            context: config.execution_context,
            token_ttl: config.token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
        }
    }

    #[must_use]
    pub fn execution_context(&self) -> ExecutionContext {
        self.context
    }

    /// Writes all three fields, cookie backend first. Best-effort.
    pub fn save(&self, record: &PersistedRecord) {
        let user_json = match serde_json::to_string(&record.user) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize user for persistence");
                None
            }
        };

        self.write_cookie(TOKEN_COOKIE, Some(&record.access_token), self.token_ttl);
        self.write_cookie(
            REFRESH_TOKEN_COOKIE,
            record.refresh_token.as_deref(),
            self.refresh_token_ttl,
        );
        self.write_cookie(USER_COOKIE, user_json.as_deref(), self.token_ttl);

        if self.context.is_client() {
            self.write_local(TOKEN_LOCAL_KEY, Some(&record.access_token));
            self.write_local(REFRESH_TOKEN_LOCAL_KEY, record.refresh_token.as_deref());
            self.write_local(USER_LOCAL_KEY, user_json.as_deref());
        }
    }

    /// Updates only the access token in both backends.
    pub fn save_access_token(&self, token: &str) {
        self.write_cookie(TOKEN_COOKIE, Some(token), self.token_ttl);
        if self.context.is_client() {
            self.write_local(TOKEN_LOCAL_KEY, Some(token));
        }
    }

    /// Updates only the user record in both backends.
    pub fn save_user(&self, user: &User) {
        let json = match serde_json::to_string(user) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize user for persistence");
                return;
            }
        };
        self.write_cookie(USER_COOKIE, Some(&json), self.token_ttl);
        if self.context.is_client() {
            self.write_local(USER_LOCAL_KEY, Some(&json));
        }
    }

    /// Loads a complete record (token and user present), cookie backend first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a stored user record is not valid JSON.
    pub fn load(&self) -> Result<Option<PersistedRecord>, Error> {
        if let Some(record) = Self::read_record(
            self.cookies.as_ref(),
            TOKEN_COOKIE,
            REFRESH_TOKEN_COOKIE,
            USER_COOKIE,
        )? {
            tracing::debug!("Session restored from cookies");
            return Ok(Some(record));
        }

        if self.context.is_client() {
            if let Some(record) = Self::read_record(
                self.local.as_ref(),
                TOKEN_LOCAL_KEY,
                REFRESH_TOKEN_LOCAL_KEY,
                USER_LOCAL_KEY,
            )? {
                tracing::debug!("Session restored from local storage");
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Removes every session key from both backends. Idempotent.
    pub fn clear(&self) {
        for key in [TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, USER_COOKIE] {
            self.write_cookie(key, None, Duration::ZERO);
        }
        if self.context.is_client() {
            for key in [TOKEN_LOCAL_KEY, REFRESH_TOKEN_LOCAL_KEY, USER_LOCAL_KEY] {
                self.write_local(key, None);
            }
        }
    }

    /// Access token from the cookie backend, used before the session is hydrated.
    #[must_use]
    pub fn cookie_token(&self) -> Option<String> {
        self.cookies.get(TOKEN_COOKIE).filter(|t| !t.is_empty())
    }

    fn read_record(
        store: &dyn KeyValueStore,
        token_key: &str,
        refresh_key: &str,
        user_key: &str,
    ) -> Result<Option<PersistedRecord>, Error> {
        let token = store.get(token_key).filter(|t| !t.is_empty());
        let user = store.get(user_key).filter(|u| !u.is_empty());
        let (Some(access_token), Some(user_json)) = (token, user) else {
            return Ok(None);
        };

        let user: User = serde_json::from_str(&user_json)
            .map_err(|e| Error::Decode(format!("stored user ({user_key}): {e}")))?;

        Ok(Some(PersistedRecord {
            access_token,
            refresh_token: store.get(refresh_key).filter(|t| !t.is_empty()),
            user,
        }))
    }

    fn write_cookie(&self, key: &str, value: Option<&str>, max_age: Duration) {
        let result = match value {
            Some(value) => self.cookies.set(key, value, Some(max_age)),
            None => self.cookies.remove(key),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, key = %key, "Cookie write failed");
        }
    }

    fn write_local(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.local.set(key, value, None),
            None => self.local.remove(key),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, key = %key, "Local storage write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;

    fn config(context: ExecutionContext) -> ClientConfig {
        ClientConfig::new("https://api.example.com".parse().unwrap()).with_execution_context(context)
    }

    fn record() -> PersistedRecord {
        PersistedRecord {
            access_token: "a.eyJleHAiOjk5OTk5OTk5OTl9.c".into(),
            refresh_token: Some("r1".into()),
            user: User::new(UserId(9), "0780000000", "Jane Doe"),
        }
    }

    fn persistence(context: ExecutionContext) -> (Persistence, Arc<CookieStore>, MemoryStore) {
        let cookies = Arc::new(CookieStore::new(true));
        let local = MemoryStore::new();
        let p = Persistence::new(&config(context), cookies.clone(), Arc::new(local.clone()));
        (p, cookies, local)
    }

    #[test]
    fn save_mirrors_identical_values_on_client() {
        let (p, cookies, local) = persistence(ExecutionContext::Client);
        p.save(&record());

        assert_eq!(cookies.get(TOKEN_COOKIE), local.get(TOKEN_LOCAL_KEY));
        assert_eq!(cookies.get(REFRESH_TOKEN_COOKIE), local.get(REFRESH_TOKEN_LOCAL_KEY));
        assert_eq!(cookies.get(USER_COOKIE), local.get(USER_LOCAL_KEY));
        assert!(cookies.get(USER_COOKIE).unwrap().contains("Jane Doe"));

        let jar = cookies.jar();
        assert_eq!(jar.get(TOKEN_COOKIE).unwrap().max_age(), Some(Duration::days(7)));
        assert_eq!(jar.get(REFRESH_TOKEN_COOKIE).unwrap().max_age(), Some(Duration::days(30)));
        assert_eq!(jar.get(USER_COOKIE).unwrap().max_age(), Some(Duration::days(7)));
    }

    #[test]
    fn server_context_never_touches_local() {
        let (p, cookies, local) = persistence(ExecutionContext::Server);
        p.save(&record());
        assert!(cookies.get(TOKEN_COOKIE).is_some());
        assert!(local.is_empty());
    }

    #[test]
    fn load_prefers_cookies() {
        let (p, _cookies, local) = persistence(ExecutionContext::Client);
        p.save(&record());
        local.set(TOKEN_LOCAL_KEY, "stale-local", None).unwrap();

        let loaded = p.load().unwrap().unwrap();
        assert_eq!(loaded, record());
    }

    #[test]
    fn load_falls_back_to_local_on_client_only() {
        let (p, _cookies, local) = persistence(ExecutionContext::Client);
        local.set(TOKEN_LOCAL_KEY, "local-token", None).unwrap();
        local
            .set(USER_LOCAL_KEY, r#"{"id":2,"phoneNumber":"0781111111"}"#, None)
            .unwrap();

        let loaded = p.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "local-token");
        assert_eq!(loaded.user.id, UserId(2));
        assert!(loaded.refresh_token.is_none());

        let server = Persistence::new(
            &config(ExecutionContext::Server),
            Arc::new(CookieStore::new(true)),
            Arc::new(local),
        );
        assert!(server.load().unwrap().is_none());
    }

    #[test]
    fn load_requires_token_and_user() {
        let (p, cookies, _local) = persistence(ExecutionContext::Client);
        cookies.set(TOKEN_COOKIE, "t", None).unwrap();
        assert!(p.load().unwrap().is_none());
    }

    #[test]
    fn load_reports_corrupt_user() {
        let (p, cookies, _local) = persistence(ExecutionContext::Client);
        cookies.set(TOKEN_COOKIE, "t", None).unwrap();
        cookies.set(USER_COOKIE, "{not json", None).unwrap();
        assert!(matches!(p.load(), Err(Error::Decode(_))));
    }

    #[test]
    fn missing_refresh_token_removes_key() {
        let (p, cookies, local) = persistence(ExecutionContext::Client);
        p.save(&record());
        p.save(&PersistedRecord {
            refresh_token: None,
            ..record()
        });
        assert!(cookies.get(REFRESH_TOKEN_COOKIE).is_none());
        assert!(local.get(REFRESH_TOKEN_LOCAL_KEY).is_none());
    }

    #[test]
    fn clear_is_idempotent_and_total() {
        let (p, cookies, local) = persistence(ExecutionContext::Client);
        p.save(&record());
        p.clear();
        p.clear();

        for key in [TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, USER_COOKIE] {
            assert!(cookies.get(key).is_none(), "cookie {key} survived clear");
        }
        assert!(local.is_empty());
        assert!(p.load().unwrap().is_none());
    }

    #[test]
    fn partial_updates_touch_both_backends() {
        let (p, cookies, local) = persistence(ExecutionContext::Client);
        p.save(&record());
        p.save_access_token("new-token");
        assert_eq!(cookies.get(TOKEN_COOKIE).as_deref(), Some("new-token"));
        assert_eq!(local.get(TOKEN_LOCAL_KEY).as_deref(), Some("new-token"));
        assert_eq!(p.cookie_token().as_deref(), Some("new-token"));

        let renamed = User::new(UserId(9), "0780000000", "Renamed");
        p.save_user(&renamed);
        assert_eq!(p.load().unwrap().unwrap().user.full_name, "Renamed");
        assert!(local.get(USER_LOCAL_KEY).unwrap().contains("Renamed"));
    }

    #[test]
    fn debug_redacts_tokens() {
        let out = format!("{:?}", record());
        assert!(!out.contains("eyJ"));
        assert!(!out.contains("r1"));
    }
}
