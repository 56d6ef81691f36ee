use thiserror::Error;

/// Result type for Casambi operations
pub type Result<T> = std::result::Result<T, CasambiError>;

/// Errors that can occur when talking to the Casambi cloud
#[derive(Error, Debug)]
pub enum CasambiError {
    /// Login endpoint returned a non-success status
    #[error("Authentication failed (HTTP {status}): {body}")]
    Auth {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Authenticated REST call returned a non-success status
    #[error("API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Caller supplied an argument the API cannot accept
    #[error("Invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        /// Name of the offending argument
        argument: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// Control or read attempted while the wire is not open
    #[error("Wire is not connected")]
    NotConnected,

    /// App API call made without an unexpired session
    #[error("Not authenticated or session expired")]
    NotAuthenticated,

    /// Inbound data did not have the shape a call required
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No reply arrived in time
    #[error("Request timeout")]
    Timeout,

    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is missing a required key
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file is not valid YAML
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CasambiError {
    pub(crate) fn invalid(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }

    /// HTTP status carried by `Auth` and `Api` errors
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body carried by `Auth` and `Api` errors
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Auth { body, .. } | Self::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }
}
