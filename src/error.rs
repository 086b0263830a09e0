use crate::http::NormalizedError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Rejected locally before any request was sent.
    #[error("{0}")]
    Validation(String),
    /// No response was received (status 0).
    #[error("{0}")]
    Network(NormalizedError),
    /// Non-2xx response, already classified by the pipeline.
    #[error("{0}")]
    Http(NormalizedError),
    /// 2xx response whose envelope reported `success: false`.
    #[error("{0}")]
    Api(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("No refresh token available")]
    MissingRefreshToken,
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True when the HTTP pipeline has already notified the user about this failure.
    #[must_use]
    pub fn is_surfaced(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Http(_))
    }

    /// HTTP status of the failure, `Some(0)` for network errors.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Network(e) | Self::Http(e) => Some(e.status_code),
            _ => None,
        }
    }

    /// The normalized pipeline error, if this failure came from the pipeline.
    #[must_use]
    pub fn normalized(&self) -> Option<&NormalizedError> {
        match self {
            Self::Network(e) | Self::Http(e) => Some(e),
            _ => None,
        }
    }

    /// Message to show the user, falling back to `default` for internal failures.
    #[must_use]
    pub fn user_message(&self, default: &str) -> String {
        let message = match self {
            Self::Validation(msg) | Self::Api(msg) => msg.as_str(),
            Self::Network(e) | Self::Http(e) => e.message.as_str(),
            Self::MissingRefreshToken => "No refresh token available",
            Self::Decode(_) | Self::Storage(_) | Self::Config(_) => "",
        };
        if message.is_empty() {
            default.to_owned()
        } else {
            message.to_owned()
        }
    }
}

impl From<NormalizedError> for Error {
    fn from(e: NormalizedError) -> Self {
        if e.is_network() {
            Self::Network(e)
        } else {
            Self::Http(e)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_errors_split_on_status_zero() {
        let network: Error = NormalizedError::new(0, "Network error").into();
        let http: Error = NormalizedError::new(503, "Service unavailable").into();

        assert!(matches!(network, Error::Network(_)));
        assert!(matches!(http, Error::Http(_)));
        assert_eq!(network.status_code(), Some(0));
        assert_eq!(http.status_code(), Some(503));
        assert!(network.is_surfaced() && http.is_surfaced());
    }

    #[test]
    fn user_message_prefers_specific_text() {
        let api = Error::Api("Phone already registered".into());
        assert_eq!(api.user_message("Login failed"), "Phone already registered");

        let decode = Error::Decode("expected value at line 1".into());
        assert_eq!(decode.user_message("Login failed"), "Login failed");
        assert!(!decode.is_surfaced());

        let empty = Error::Api(String::new());
        assert_eq!(empty.user_message("Registration failed"), "Registration failed");
    }
}
