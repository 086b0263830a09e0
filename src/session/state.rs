use std::fmt;

use crate::types::{Role, User};

/// Phase of the authentication state machine.
///
/// "Expired" is not a phase: it is a predicate over `Authenticated`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthPhase {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// In-memory authentication state.
///
/// `is_logged_in` implies a non-empty `access_token`.
#[derive(Clone, PartialEq)]
#[non_exhaustive]
pub struct Session {
    pub user: Option<User>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub is_logged_in: bool,
    pub loading: bool,
    pub last_error: Option<String>,
    pub phase: AuthPhase,
}

pub(crate) const DEFAULT_TOKEN_TYPE: &str = "Bearer";

impl Default for Session {
    fn default() -> Self {
        Self {
            user: None,
            access_token: String::new(),
            refresh_token: None,
            token_type: DEFAULT_TOKEN_TYPE.to_owned(),
            is_logged_in: false,
            loading: false,
            last_error: None,
            phase: AuthPhase::Anonymous,
        }
    }
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_logged_in && !self.access_token.is_empty()
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        self.user.as_ref().map_or("", |u| u.full_name.as_str())
    }

    #[must_use]
    pub fn phone_number(&self) -> &str {
        self.user.as_ref().map_or("", |u| u.phone_number.as_str())
    }

    #[must_use]
    pub fn email(&self) -> &str {
        self.user
            .as_ref()
            .and_then(|u| u.email.as_deref())
            .unwrap_or("")
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.user.as_ref().map_or(Role::User, |u| u.role)
    }

    /// `Authorization` header value for the current token.
    #[must_use]
    pub fn auth_header(&self) -> Option<String> {
        (!self.access_token.is_empty()).then(|| format!("Bearer {}", self.access_token))
    }

    /// Drop every credential and return to the anonymous defaults.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |present: bool| if present { "[REDACTED]" } else { "" };
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("access_token", &redact(!self.access_token.is_empty()))
            .field("refresh_token", &redact(self.refresh_token.is_some()))
            .field("token_type", &self.token_type)
            .field("is_logged_in", &self.is_logged_in)
            .field("loading", &self.loading)
            .field("last_error", &self.last_error)
            .field("phase", &self.phase)
            .finish()
    }
}
