use std::sync::{Mutex, MutexGuard, PoisonError};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use reqwest::header::HeaderMap;
use time::Duration;

use super::KeyValueStore;
use crate::error::Error;

/// Cookie-backed store, readable during server rendering.
///
/// Values are percent-encoded so JSON fits in a cookie value. The jar keeps
/// its delta, so a server handler can return [`CookieStore::jar`] to emit the
/// matching `Set-Cookie` headers.
pub struct CookieStore {
    jar: Mutex<CookieJar>,
    secure: bool,
}

impl CookieStore {
    #[must_use]
    pub fn new(secure: bool) -> Self {
        Self {
            jar: Mutex::new(CookieJar::new()),
            secure,
        }
    }

    /// Start from the `Cookie` header of an incoming request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, secure: bool) -> Self {
        Self {
            jar: Mutex::new(CookieJar::from_headers(headers)),
            secure,
        }
    }

    /// Snapshot of the jar, including pending additions and removals.
    #[must_use]
    pub fn jar(&self) -> CookieJar {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, CookieJar> {
        self.jar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for CookieStore {
    fn get(&self, key: &str) -> Option<String> {
        let jar = self.lock();
        let raw = jar.get(key)?.value().to_owned();
        drop(jar);
        if raw.is_empty() {
            return None;
        }
        match urlencoding::decode(&raw) {
            Ok(value) => Some(value.into_owned()),
            Err(e) => {
                tracing::warn!(error = %e, cookie = %key, "Cookie value is not valid UTF-8");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str, max_age: Option<Duration>) -> Result<(), Error> {
        let cookie = session_cookie(key, value, max_age, self.secure);
        let mut jar = self.lock();
        *jar = jar.clone().add(cookie);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let mut jar = self.lock();
        *jar = jar.clone().remove(removal_cookie(key));
        Ok(())
    }
}

/// JS-readable session cookie (the browser side mirrors it into local storage).
fn session_cookie(
    name: &str,
    value: &str,
    max_age: Option<Duration>,
    secure: bool,
) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_owned(), urlencoding::encode(value).into_owned()))
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_owned());
    if let Some(max_age) = max_age {
        builder = builder.max_age(max_age);
    }
    builder.build()
}

fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_owned(), ""))
        .path("/".to_owned())
        .max_age(Duration::ZERO)
        .build()
}
