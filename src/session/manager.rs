use std::future::Future;
use std::sync::Arc;

use serde_json::{Value as JsonValue, json};

use super::context::SessionContext;
use super::state::{AuthPhase, Session};
use crate::error::Error;
use crate::http::{ApiClient, Body};
use crate::notify::Notification;
use crate::phone;
use crate::storage::PersistedRecord;
use crate::types::{LoginResponse, ProfileUpdate, RefreshResponse, Role, User};

/// Drives the authentication state machine.
///
/// Cheap to clone; clones share the same session. The `loading` flag is
/// advisory: concurrent calls are not serialized and the last write wins.
#[derive(Clone)]
pub struct SessionManager {
    api: ApiClient,
    ctx: Arc<SessionContext>,
}

impl SessionManager {
    pub(crate) fn new(api: ApiClient, ctx: Arc<SessionContext>) -> Self {
        Self { api, ctx }
    }

    /// Phone-number login. Persists and installs the session on success.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the number is shorter than 10 characters (no request is sent)
    /// - [`Error::Network`] / [`Error::Http`] from the pipeline
    /// - [`Error::Api`] if the server answered `success: false` or sent no data
    pub async fn login(&self, phone_number: &str) -> Result<User, Error> {
        let _loading = self.ctx.begin_loading();
        self.ctx.write(|s| {
            s.last_error = None;
            s.phase = AuthPhase::Authenticating;
        });

        match self.try_login(phone_number).await {
            Ok(user) => {
                self.ctx.notify(Notification::success("Login successful"));
                tracing::info!(user_id = %user.id, "Login successful");
                Ok(user)
            }
            Err(e) => {
                self.ctx.write(|s| {
                    if s.phase == AuthPhase::Authenticating {
                        s.phase = if s.is_authenticated() {
                            AuthPhase::Authenticated
                        } else {
                            AuthPhase::Anonymous
                        };
                    }
                });
                Err(self.fail("login", e, "Login failed. Please try again."))
            }
        }
    }

    async fn try_login(&self, phone_number: &str) -> Result<User, Error> {
        if !phone::is_valid_login_phone(phone_number) {
            return Err(Error::Validation("Invalid phone number".into()));
        }

        let body = Body::json(&json!({ "phoneNumber": phone_number }))?;
        let data: LoginResponse = self
            .api
            .post("/auth/phone-login", Some(body))
            .await?
            .into_data("Login failed")?;
        if data.access_token.is_empty() {
            return Err(Error::Decode("login response carried no access token".into()));
        }

        let user = data.user.clone();
        self.ctx.establish(
            PersistedRecord {
                access_token: data.access_token,
                refresh_token: data.refresh_token,
                user: data.user,
            },
            data.token_type,
        );
        Ok(user)
    }

    /// Creates an account. Does not sign in.
    ///
    /// # Errors
    ///
    /// Pipeline errors, or [`Error::Api`] when the server rejects the registration.
    pub async fn register(
        &self,
        phone_number: &str,
        full_name: &str,
        email: Option<&str>,
    ) -> Result<(), Error> {
        self.stateless(
            "register",
            "Registration successful! Please login.",
            "Registration failed. Please try again.",
            async {
                let body = Body::json(&json!({
                    "phoneNumber": phone_number,
                    "fullName": full_name,
                    "email": email,
                }))?;
                self.api
                    .post::<JsonValue>("/auth/register", Some(body))
                    .await?
                    .ensure_success("Registration failed")?;
                Ok::<_, Error>(())
            },
        )
        .await
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// Any failure after the request was sent ends the session. Never retried.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingRefreshToken`] without a refresh token (the session is kept)
    /// - pipeline, [`Error::Api`] or [`Error::Decode`] errors otherwise
    pub async fn refresh_access_token(&self) -> Result<(), Error> {
        let _loading = self.ctx.begin_loading();
        let refresh_token = self.ctx.write(|s| {
            s.last_error = None;
            s.refresh_token.clone().filter(|t| !t.is_empty())
        });
        let Some(refresh_token) = refresh_token else {
            tracing::warn!("Token refresh requested without a refresh token");
            let err = Error::MissingRefreshToken;
            self.ctx.write(|s| s.last_error = Some(err.to_string()));
            return Err(err);
        };

        self.ctx.write(|s| s.phase = AuthPhase::Refreshing);

        match self.try_refresh(&refresh_token).await {
            Ok(()) => {
                tracing::info!("Token refreshed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Token refresh failed");
                // A 401 with a live user has already cleared the session.
                if self.ctx.read(|s| s.is_logged_in) {
                    self.ctx.logout();
                } else {
                    self.ctx.write(|s| s.phase = AuthPhase::Anonymous);
                }
                let message = server_message(&e).unwrap_or_else(|| "Token refresh failed".to_owned());
                self.ctx.write(|s| s.last_error = Some(message));
                Err(e)
            }
        }
    }

    async fn try_refresh(&self, refresh_token: &str) -> Result<(), Error> {
        let body = Body::json(&json!({ "refreshToken": refresh_token }))?;
        let data: RefreshResponse = self
            .api
            .post("/auth/refresh", Some(body))
            .await?
            .into_data("Token refresh failed")?;
        if data.access_token.is_empty() {
            return Err(Error::Decode("refresh response carried no access token".into()));
        }

        let applied = self.ctx.write(|s| {
            if !s.is_logged_in {
                return false;
            }
            s.access_token = data.access_token.clone();
            s.phase = AuthPhase::Authenticated;
            true
        });
        if applied {
            self.ctx.persistence().save_access_token(&data.access_token);
        } else {
            tracing::info!("Session ended while refreshing, discarding new token");
        }
        Ok(())
    }

    /// Clears the session everywhere and navigates to the logout route.
    pub fn logout(&self) {
        self.ctx.logout();
    }

    /// Hydrates the session from persistence without checking expiry.
    ///
    /// Returns whether a session was restored. A corrupt record logs out.
    pub fn restore_auth(&self) -> bool {
        self.ctx.restore_auth()
    }

    /// Early-expiry check on the current access token. Empty counts as expired.
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        self.ctx.is_token_expired()
    }

    /// Sends a profile update and merges the response into the current user.
    ///
    /// # Errors
    ///
    /// Pipeline errors, [`Error::Api`] on rejection, or [`Error::Decode`] if the
    /// merged user is invalid.
    pub async fn update_user_profile(&self, update: &ProfileUpdate) -> Result<User, Error> {
        self.stateless(
            "update_user_profile",
            "Profile updated successfully",
            "Failed to update profile",
            async {
                let patch: JsonValue = self
                    .api
                    .put("/users/profile", Some(Body::json(update)?))
                    .await?
                    .into_data("Failed to update profile")?;

                let merged = match self.ctx.read(|s| s.user.clone()) {
                    Some(current) => current.merged_with(patch)?,
                    None => serde_json::from_value(patch)?,
                };
                self.ctx.write(|s| s.user = Some(merged.clone()));
                self.ctx.persistence().save_user(&merged);
                Ok::<_, Error>(merged)
            },
        )
        .await
    }

    /// # Errors
    ///
    /// Pipeline errors, or [`Error::Api`] when the server rejects the change.
    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), Error> {
        self.stateless(
            "change_password",
            "Password changed successfully",
            "Failed to change password",
            async {
                let body = Body::json(&json!({
                    "currentPassword": current,
                    "newPassword": new,
                }))?;
                self.api
                    .post::<JsonValue>("/auth/change-password", Some(body))
                    .await?
                    .ensure_success("Failed to change password")?;
                Ok::<_, Error>(())
            },
        )
        .await
    }

    /// # Errors
    ///
    /// Pipeline errors, or [`Error::Api`] when the server rejects the request.
    pub async fn request_password_reset(&self, phone_number: &str) -> Result<(), Error> {
        self.stateless(
            "request_password_reset",
            "Password reset link sent to your phone",
            "Failed to request password reset",
            async {
                let body = Body::json(&json!({ "phoneNumber": phone_number }))?;
                self.api
                    .post::<JsonValue>("/auth/forgot-password", Some(body))
                    .await?
                    .ensure_success("Failed to request password reset")?;
                Ok::<_, Error>(())
            },
        )
        .await
    }

    /// # Errors
    ///
    /// Pipeline errors, or [`Error::Api`] when the code is rejected.
    pub async fn verify_account(&self, code: &str) -> Result<(), Error> {
        self.stateless(
            "verify_account",
            "Account verified successfully",
            "Verification failed",
            async {
                let body = Body::json(&json!({ "code": code }))?;
                self.api
                    .post::<JsonValue>("/auth/verify", Some(body))
                    .await?
                    .ensure_success("Verification failed")?;
                Ok::<_, Error>(())
            },
        )
        .await
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.ctx.read(Session::is_authenticated)
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.ctx.read(|s| s.user.clone())
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        self.ctx.read(|s| s.full_name().to_owned())
    }

    #[must_use]
    pub fn phone_number(&self) -> String {
        self.ctx.read(|s| s.phone_number().to_owned())
    }

    #[must_use]
    pub fn email(&self) -> String {
        self.ctx.read(|s| s.email().to_owned())
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.ctx.read(Session::role)
    }

    #[must_use]
    pub fn auth_header(&self) -> Option<String> {
        self.ctx.read(Session::auth_header)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.ctx.read(|s| s.loading)
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.ctx.read(|s| s.last_error.clone())
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        self.ctx.read(|s| s.phase)
    }

    /// Copy of the whole session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.ctx.snapshot()
    }

    /// Runs a request/response operation that leaves the phase untouched.
    async fn stateless<T>(
        &self,
        operation: &'static str,
        success: &str,
        default_error: &str,
        op: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        let _loading = self.ctx.begin_loading();
        self.ctx.write(|s| s.last_error = None);

        match op.await {
            Ok(value) => {
                self.ctx.notify(Notification::success(success));
                Ok(value)
            }
            Err(e) => Err(self.fail(operation, e, default_error)),
        }
    }

    /// Records the failure and notifies unless the pipeline already has.
    fn fail(&self, operation: &'static str, err: Error, default_message: &str) -> Error {
        tracing::error!(error = %err, operation, "Session operation failed");
        let message = err.user_message(default_message);
        self.ctx.write(|s| s.last_error = Some(message.clone()));
        if !err.is_surfaced() {
            self.ctx.notify(Notification::error(message));
        }
        err
    }
}

/// `message` from the error body of a failed request.
fn server_message(err: &Error) -> Option<String> {
    err.normalized()?
        .payload
        .as_ref()?
        .get("message")?
        .as_str()
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
}
