//! Error handling for the market-entry client

use std::fmt;
use thiserror::Error;

/// Message shown when a request never received a response
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

/// Unified error type for the market-entry client
#[derive(Error, Debug)]
pub enum Error {
    /// Transport errors raised while reading a response body
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The server rejected the supplied credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The request was sent but no response was received
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success status, with the message the server attached if any
    #[error("Server error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        message: Option<String>,
    },

    /// The operation needs an authenticated identity
    #[error("Not logged in")]
    Unauthenticated,

    /// Durable storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// The operation was superseded by a newer one
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a new network error
    pub fn network<T: fmt::Display>(msg: T) -> Self {
        Error::Network(msg.to_string())
    }

    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Whether this error only signals that a newer operation took over
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Status code for server-reported failures
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Collapse the error into the single string shown to the user.
    pub fn display_message(&self) -> String {
        match self {
            Error::InvalidCredentials(message) => message.clone(),
            Error::Server {
                message: Some(message),
                ..
            } => message.clone(),
            Error::Server {
                status,
                message: None,
            } => format!("Request failed with status {}", status),
            Error::Network(_) | Error::Http(_) => NETWORK_ERROR_MESSAGE.to_string(),
            Error::Unauthenticated => "Please log in to continue.".to_string(),
            other => other.to_string(),
        }
    }

    /// Turn a 400/401 server reply into a credential error, keeping its message
    /// or using `fallback` when the server sent none.
    pub(crate) fn into_credentials_error(self, fallback: &str) -> Self {
        match self {
            Error::Server { status, message } if status == 400 || status == 401 => {
                Error::InvalidCredentials(message.unwrap_or_else(|| fallback.to_string()))
            }
            Error::Server {
                status,
                message: None,
            } => Error::Server {
                status,
                message: Some(fallback.to_string()),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_message_collapses_variants() {
        let err = Error::InvalidCredentials("Invalid email or password".to_string());
        assert_eq!(err.display_message(), "Invalid email or password");

        let err = Error::network("connection refused");
        assert_eq!(err.display_message(), NETWORK_ERROR_MESSAGE);

        let err = Error::Server {
            status: 500,
            message: None,
        };
        assert_eq!(err.display_message(), "Request failed with status 500");
    }

    #[test]
    fn test_credentials_error_mapping() {
        let err = Error::Server {
            status: 400,
            message: None,
        }
        .into_credentials_error("Login failed");
        assert!(matches!(err, Error::InvalidCredentials(ref m) if m == "Login failed"));

        let err = Error::Server {
            status: 503,
            message: Some("Maintenance".to_string()),
        }
        .into_credentials_error("Login failed");
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.display_message(), "Maintenance");

        let err = Error::network("timeout").into_credentials_error("Login failed");
        assert!(matches!(err, Error::Network(_)));
    }
}
