use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::notify::Notification;

/// Field-level validation failure reported with a 422.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub message: String,
}

/// The single error shape produced by the HTTP pipeline.
///
/// `status_code` is 0 when no response was received.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
#[non_exhaustive]
pub struct NormalizedError {
    pub status_code: u16,
    pub message: String,
    pub payload: Option<JsonValue>,
    pub validation_errors: Vec<FieldError>,
}

impl NormalizedError {
    #[must_use]
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            payload: None,
            validation_errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Option<JsonValue>) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_validation_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.validation_errors = errors;
        self
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        self.status_code == 0
    }
}

/// Side effect requested by the error table beyond the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Effect {
    None,
    ForceLogout,
    NotFoundPage(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Classified {
    pub(crate) error: NormalizedError,
    pub(crate) notification: Notification,
    pub(crate) effect: Effect,
}

/// Maps a non-2xx response onto the fixed error table.
pub(crate) fn classify_status(
    status: u16,
    payload: Option<JsonValue>,
    user_present: bool,
) -> Classified {
    let server_message = payload.as_ref().and_then(server_message);
    let mut effect = Effect::None;

    let (message, notification) = match status {
        401 if user_present => {
            effect = Effect::ForceLogout;
            (
                "Unauthorized".to_owned(),
                Notification::error("Session expired. Please login again."),
            )
        }
        401 => (
            "Unauthorized".to_owned(),
            Notification::error("Authentication required"),
        ),
        403 => (
            "Forbidden".to_owned(),
            Notification::error("You do not have permission to perform this action"),
        ),
        404 => {
            effect = Effect::NotFoundPage(
                server_message
                    .clone()
                    .unwrap_or_else(|| "Resource not found".to_owned()),
            );
            let message = server_message.unwrap_or_else(|| "Not found".to_owned());
            (message.clone(), Notification::error(message))
        }
        405 => (
            "Method not allowed".to_owned(),
            Notification::warning("This feature is not yet available"),
        ),
        422 => {
            let notification =
                Notification::error(server_message.as_deref().unwrap_or("Validation failed"));
            (
                server_message.unwrap_or_else(|| "Validation error".to_owned()),
                notification,
            )
        }
        429 => (
            "Rate limit exceeded".to_owned(),
            Notification::error("Too many requests. Please try again later."),
        ),
        500 => (
            "Internal server error".to_owned(),
            Notification::error("Server error. Please try again later."),
        ),
        503 => (
            "Service unavailable".to_owned(),
            Notification::error("Service temporarily unavailable. Please try again later."),
        ),
        _ => {
            let message = server_message.unwrap_or_else(|| "An error occurred".to_owned());
            (message.clone(), Notification::error(message))
        }
    };

    let validation_errors = if status == 422 {
        payload.as_ref().map(field_errors).unwrap_or_default()
    } else {
        Vec::new()
    };

    Classified {
        error: NormalizedError::new(status, message)
            .with_payload(payload)
            .with_validation_errors(validation_errors),
        notification,
        effect,
    }
}

/// Classification for a request that never produced a response.
pub(crate) fn classify_network_failure() -> Classified {
    Classified {
        error: NormalizedError::new(0, "Network error"),
        notification: Notification::warning("Network error. Please check your internet connection."),
        effect: Effect::None,
    }
}

/// `message`, else `error`, from a JSON error body.
fn server_message(payload: &JsonValue) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| payload.get(key).and_then(JsonValue::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

fn field_errors(payload: &JsonValue) -> Vec<FieldError> {
    payload
        .get("errors")
        .cloned()
        .and_then(|errors| serde_json::from_value(errors).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::notify::AlertKind;

    #[test]
    fn unauthorized_with_user_forces_logout() {
        let c = classify_status(401, None, true);
        assert_eq!(c.error.message, "Unauthorized");
        assert_eq!(c.effect, Effect::ForceLogout);
        assert_eq!(c.notification.message, "Session expired. Please login again.");
    }

    #[test]
    fn unauthorized_without_user_only_notifies() {
        let c = classify_status(401, Some(json!({ "message": "bad token" })), false);
        assert_eq!(c.error.message, "Unauthorized");
        assert_eq!(c.effect, Effect::None);
        assert_eq!(c.notification.message, "Authentication required");
    }

    #[test]
    fn not_found_prefers_server_message_and_raises_page() {
        let c = classify_status(404, Some(json!({ "message": "No such payment" })), false);
        assert_eq!(c.error.message, "No such payment");
        assert_eq!(c.effect, Effect::NotFoundPage("No such payment".into()));

        let c = classify_status(404, None, false);
        assert_eq!(c.error.message, "Not found");
        assert_eq!(c.effect, Effect::NotFoundPage("Resource not found".into()));
    }

    #[test]
    fn method_not_allowed_is_a_warning() {
        let c = classify_status(405, None, false);
        assert_eq!(c.error.message, "Method not allowed");
        assert_eq!(c.notification.kind, AlertKind::Warning);
    }

    #[test]
    fn validation_errors_are_attached() {
        let body = json!({
            "message": "Invalid input",
            "errors": [{ "field": "amount", "message": "must be positive" }],
        });
        let c = classify_status(422, Some(body), false);
        assert_eq!(c.error.message, "Invalid input");
        assert_eq!(
            c.error.validation_errors,
            vec![FieldError {
                field: "amount".into(),
                message: "must be positive".into(),
            }]
        );

        let c = classify_status(422, None, false);
        assert_eq!(c.error.message, "Validation error");
        assert_eq!(c.notification.message, "Validation failed");
        assert!(c.error.validation_errors.is_empty());
    }

    #[test]
    fn fixed_messages_ignore_server_text() {
        let body = Some(json!({ "message": "db exploded" }));
        assert_eq!(classify_status(403, body.clone(), false).error.message, "Forbidden");
        assert_eq!(classify_status(429, body.clone(), false).error.message, "Rate limit exceeded");
        assert_eq!(classify_status(500, body.clone(), false).error.message, "Internal server error");
        assert_eq!(classify_status(503, body, false).error.message, "Service unavailable");
    }

    #[test]
    fn other_statuses_use_server_message_or_error_field() {
        let c = classify_status(409, Some(json!({ "error": "Duplicate reference" })), false);
        assert_eq!(c.error.message, "Duplicate reference");
        assert_eq!(c.error.status_code, 409);

        let c = classify_status(418, None, false);
        assert_eq!(c.error.message, "An error occurred");
    }

    #[test]
    fn network_failure_is_status_zero_warning() {
        let c = classify_network_failure();
        assert!(c.error.is_network());
        assert_eq!(c.error.message, "Network error");
        assert_eq!(c.notification.kind, AlertKind::Warning);
    }
}
