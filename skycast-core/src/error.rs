//! Error types shared across the core.

use thiserror::Error;

/// Shown when the proxy gives no message of its own.
pub const DEFAULT_FETCH_MESSAGE: &str = "Failed to fetch weather data";

/// Device geolocation failures. All of them degrade to a fallback location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Position unavailable")]
    PositionUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Geolocation is not supported on this device")]
    Unsupported,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream request failed with status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Upstream { status: u16, message: Option<String> },

    #[error("Failed to parse {what} JSON: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Message for the status line: the proxy's own message if it sent one.
    pub fn user_message(&self) -> String {
        match self {
            Self::Upstream { message: Some(message), .. } => message.clone(),
            _ => DEFAULT_FETCH_MESSAGE.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Network(err) => err.status().map(|s| s.as_u16()),
            Self::Decode { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Search query must not be empty")]
    EmptyQuery,

    /// A search was accepted while this device position was being fetched.
    #[error("Superseded by a newer location request")]
    Superseded,

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ResolveError {
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyQuery | Self::Superseded => self.to_string(),
            Self::Fetch(err) => err.user_message(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
