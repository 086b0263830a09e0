use derive_more::{Display, From, Into};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Error;

/// Server-side user identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

/// Authenticated account as returned by the auth and profile endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct User {
    pub id: UserId,
    pub phone_number: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub last_login_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl User {
    /// Create a `User` with the required fields only.
    #[must_use]
    pub fn new(id: UserId, phone_number: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id,
            phone_number: phone_number.into(),
            full_name: full_name.into(),
            email: None,
            role: Role::User,
            last_login_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Shallow-merges the fields of `patch` over this user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `patch` is not an object or the merged
    /// value is no longer a valid user.
    pub fn merged_with(&self, patch: JsonValue) -> Result<Self, Error> {
        let JsonValue::Object(fields) = patch else {
            return Err(Error::Decode("profile update is not an object".into()));
        };
        let mut current = serde_json::to_value(self)?;
        if let JsonValue::Object(map) = &mut current {
            map.extend(fields);
        }
        Ok(serde_json::from_value(current)?)
    }
}

/// Standard response envelope: `{ success, message, data }`.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Returns `data` when the call succeeded and carried a payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] with the server message (or `default_message`)
    /// when `success` is false or `data` is missing.
    pub fn into_data(self, default_message: &str) -> Result<T, Error> {
        let Self {
            success,
            message,
            data,
            ..
        } = self;
        match data {
            Some(data) if success => Ok(data),
            _ => Err(api_failure(message, default_message)),
        }
    }

    /// Like [`into_data`](Self::into_data) but tolerates an absent payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] when `success` is false.
    pub fn ensure_success(self, default_message: &str) -> Result<Option<T>, Error> {
        if self.success {
            Ok(self.data)
        } else {
            Err(api_failure(self.message, default_message))
        }
    }
}

impl ApiResponse<JsonValue> {
    /// Types `data` only once the envelope reported success, so a rejected
    /// call keeps its message whatever shape its `data` has.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a successful payload does not match `T`.
    pub(crate) fn decode<T: DeserializeOwned>(self) -> Result<ApiResponse<T>, Error> {
        let data = match self.data {
            Some(data) if self.success => Some(serde_json::from_value(data)?),
            _ => None,
        };
        Ok(ApiResponse {
            success: self.success,
            message: self.message,
            data,
            timestamp: self.timestamp,
        })
    }
}

fn api_failure(message: Option<String>, default_message: &str) -> Error {
    Error::Api(
        message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_message.to_owned()),
    )
}

/// Payload of `POST /auth/phone-login`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: User,
    #[serde(default)]
    pub new_user: bool,
}

/// Payload of `POST /auth/refresh`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Body of `PUT /users/profile`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn user_serde_uses_camel_case() {
        let user = User::new(UserId(7), "0780000000", "Jane Doe").with_role(Role::SuperAdmin);
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["phoneNumber"], "0780000000");
        assert_eq!(json["fullName"], "Jane Doe");
        assert_eq!(json["role"], "SUPER_ADMIN");
        assert!(json.get("createdAt").is_none());
    }

    #[test]
    fn user_defaults_missing_optional_fields() {
        let user: User = serde_json::from_value(json!({
            "id": 3,
            "phoneNumber": "0781111111",
        }))
        .unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(user.full_name, "");
        assert!(user.email.is_none());
    }

    #[test]
    fn merge_overrides_only_given_fields() {
        let user = User::new(UserId(1), "0780000000", "Old Name");
        let merged = user
            .merged_with(json!({ "fullName": "New Name", "email": "n@example.com" }))
            .unwrap();
        assert_eq!(merged.full_name, "New Name");
        assert_eq!(merged.email.as_deref(), Some("n@example.com"));
        assert_eq!(merged.phone_number, "0780000000");
        assert_eq!(merged.id, UserId(1));
    }

    #[test]
    fn merge_rejects_non_objects() {
        let user = User::new(UserId(1), "0780000000", "Name");
        assert!(matches!(user.merged_with(json!("nope")), Err(Error::Decode(_))));
    }

    #[test]
    fn envelope_failure_carries_server_message() {
        let resp: ApiResponse<JsonValue> =
            serde_json::from_value(json!({ "success": false, "message": "Phone already registered" }))
                .unwrap();
        let err = resp.into_data("Login failed").unwrap_err();
        assert!(matches!(err, Error::Api(ref m) if m == "Phone already registered"));
    }

    #[test]
    fn envelope_success_without_data_is_a_failure_for_into_data() {
        let resp: ApiResponse<JsonValue> =
            serde_json::from_value(json!({ "success": true, "message": "" })).unwrap();
        let err = resp.clone().into_data("Login failed").unwrap_err();
        assert!(matches!(err, Error::Api(ref m) if m == "Login failed"));
        assert!(resp.ensure_success("unused").unwrap().is_none());
    }

    #[test]
    fn rejected_envelope_ignores_malformed_data() {
        for data in [json!({}), json!([]), json!("oops")] {
            let raw: ApiResponse<JsonValue> = serde_json::from_value(json!({
                "success": false,
                "message": "Phone already registered",
                "data": data,
            }))
            .unwrap();
            let err = raw.decode::<LoginResponse>().unwrap().into_data("Login failed").unwrap_err();
            assert!(matches!(err, Error::Api(ref m) if m == "Phone already registered"));
        }
    }

    #[test]
    fn successful_envelope_types_its_data() {
        let raw: ApiResponse<JsonValue> =
            serde_json::from_value(json!({ "success": true, "data": { "accessToken": "t" } }))
                .unwrap();
        let typed = raw.clone().decode::<RefreshResponse>().unwrap();
        assert_eq!(typed.into_data("x").unwrap().access_token, "t");

        let wrong: ApiResponse<JsonValue> =
            serde_json::from_value(json!({ "success": true, "data": {} })).unwrap();
        assert!(matches!(wrong.decode::<RefreshResponse>(), Err(Error::Decode(_))));
    }

    #[test]
    fn user_id_display() {
        assert_eq!(UserId::from(42).to_string(), "42");
        let raw: i64 = UserId(5).into();
        assert_eq!(raw, 5);
    }
}
