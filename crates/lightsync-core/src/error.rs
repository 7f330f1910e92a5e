//! Gateway error handling
//!
//! Typed errors for REST calls plus helpers that turn raw gateway messages
//! into something a person can act on.

use thiserror::Error;

/// Errors that can occur while talking to the gateway
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection refused, timed out, or the request never completed
    #[error("Could not reach the gateway: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-2xx response; `message` is the server's `error` field verbatim
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Response body was not the JSON we expected
    #[error("Unexpected response from gateway: {0}")]
    Decode(String),

    /// The configured server URL is unusable
    #[error("Invalid gateway URL '{0}'")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether the failure happened below the HTTP layer
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    /// HTTP status of an application error
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::InvalidUrl(
                err.url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| err.to_string()),
            )
        } else {
            ApiError::Transport(err)
        }
    }
}

/// Result type for gateway operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Turn a failed pairing attempt into a friendlier message
///
/// The gateway forwards the bridge's own error text, so we look for the
/// few cases a user can actually fix.
pub fn describe_pairing_error(message: &str, bridge_ip: &str) -> String {
    let lower = message.to_lowercase();

    if lower.contains("link button") || message.contains("101") {
        "Press the link button on the bridge and try again within 30 seconds.".to_string()
    } else if lower.contains("timeout")
        || message.contains("ETIMEDOUT")
        || message.contains("ECONNREFUSED")
    {
        format!(
            "Could not connect to the bridge at {}. Check that the IP address is correct and the bridge is reachable.",
            bridge_ip
        )
    } else if lower.contains("certificate") || message.contains("TLS") {
        "TLS connection to the bridge failed. Please try again.".to_string()
    } else {
        format!("Pairing failed: {}", message)
    }
}

/// Message shown when the connectivity check itself could not run
pub fn describe_test_error(message: &str) -> String {
    format!("Connection test failed: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_is_verbatim() {
        let err = ApiError::Api {
            status: 404,
            message: "light not found".to_string(),
        };

        assert_eq!(err.to_string(), "light not found");
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_pairing_link_button() {
        let msg = describe_pairing_error("error 101: link button not pressed", "10.0.0.2");
        assert!(msg.contains("link button"));

        let msg = describe_pairing_error("hue error type 101", "10.0.0.2");
        assert!(msg.starts_with("Press the link button"));
    }

    #[test]
    fn test_pairing_unreachable() {
        let msg = describe_pairing_error("dial tcp 10.0.0.2:443: i/o timeout", "10.0.0.2");
        assert!(msg.contains("10.0.0.2"));
        assert!(msg.contains("reachable"));

        let msg = describe_pairing_error("connect ECONNREFUSED", "10.0.0.9");
        assert!(msg.contains("10.0.0.9"));
    }

    #[test]
    fn test_pairing_tls() {
        let msg = describe_pairing_error("x509: certificate signed by unknown authority", "ip");
        assert!(msg.starts_with("TLS connection"));
    }

    #[test]
    fn test_pairing_fallback() {
        let msg = describe_pairing_error("bridge exploded", "ip");
        assert_eq!(msg, "Pairing failed: bridge exploded");
    }

    #[test]
    fn test_describe_test_error() {
        assert_eq!(
            describe_test_error("bridge_ip required"),
            "Connection test failed: bridge_ip required"
        );
    }
}
