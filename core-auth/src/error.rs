use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// A protected call returned 401 and there was no refresh token to try.
    #[error("Authentication required for {url}")]
    AuthRequired { url: String },

    /// The refresh exchange failed. The local session has been cleared.
    #[error("Token refresh failed{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    RefreshFailed { status: Option<u16>, message: String },

    /// 401 on an already-retried request or on the refresh endpoint itself.
    #[error("Request to {url} was rejected with HTTP {status}; not retrying")]
    TerminalAuthFailure { url: String, status: u16 },

    #[error("Login failed{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    LoginFailed { status: Option<u16>, message: String },

    #[error("Unexpected HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Serialization failed ({context}): {source}")]
    SerializationFailed {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Transport(#[from] BridgeError),
}

impl AuthError {
    /// Errors after which the caller must treat the session as gone.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            AuthError::AuthRequired { .. } | AuthError::RefreshFailed { .. }
        )
    }

    /// HTTP status associated with the error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::RefreshFailed { status, .. } | AuthError::LoginFailed { status, .. } => {
                *status
            }
            AuthError::TerminalAuthFailure { status, .. }
            | AuthError::UnexpectedStatus { status, .. } => Some(*status),
            AuthError::AuthRequired { .. } => Some(401),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
