use thiserror::Error;

/// Failures talking to the DeskFlow backend.
///
/// Every variant is recoverable: callers surface [`GatewayError::toast_message`]
/// to the user and return to whatever they were doing before the request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The server answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response decoded but broke a protocol invariant
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Gateway configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Text for the transient notification shown to the user.
    ///
    /// Server-supplied messages win; otherwise a generic line per status class.
    pub fn toast_message(&self) -> String {
        match self {
            GatewayError::Http { message, .. } if !message.trim().is_empty() => message.clone(),
            GatewayError::Http { status, .. } => match *status {
                401 => "Your session has expired. Sign in again.".to_string(),
                403 => "You do not have permission to perform this action.".to_string(),
                404 => "The requested resource was not found.".to_string(),
                400 | 422 => "The server rejected the request as invalid.".to_string(),
                _ => "The server could not complete the request.".to_string(),
            },
            GatewayError::Network(_) => "Could not reach the server. Check your connection.".to_string(),
            GatewayError::Decode(_) | GatewayError::InvalidResponse(_) => {
                "The server sent an unexpected response.".to_string()
            }
            GatewayError::Config(msg) => format!("Client misconfigured: {msg}"),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            GatewayError::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_is_used_for_toast() {
        let err = GatewayError::Http {
            status: 422,
            message: "El comentario es obligatorio".to_string(),
        };
        assert_eq!(err.toast_message(), "El comentario es obligatorio");
        assert_eq!(err.status(), Some(422));
    }

    #[test]
    fn test_generic_toast_per_status() {
        let err = GatewayError::Http {
            status: 403,
            message: "  ".to_string(),
        };
        assert!(err.toast_message().contains("permission"));

        let err = GatewayError::Http {
            status: 503,
            message: String::new(),
        };
        assert!(err.toast_message().contains("could not complete"));
    }

    #[test]
    fn test_not_found_detection() {
        let err = GatewayError::Http {
            status: 404,
            message: String::new(),
        };
        assert!(err.is_not_found());
        assert!(!GatewayError::InvalidResponse("x".to_string()).is_not_found());
    }
}
