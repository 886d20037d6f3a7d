use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two stored credentials to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Access/refresh pair as persisted by the credential store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn get(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_token,
            TokenKind::Refresh => &self.refresh_token,
        }
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// User details returned by the backend.
///
/// Every field is optional; the login payload and the user-details endpoint
/// do not always carry the same set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, alias = "pk")]
    pub id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl UserProfile {
    /// Placeholder profile when the backend did not describe the user.
    pub fn from_identifier(identifier: impl Into<String>) -> Self {
        Self {
            email: Some(identifier.into()),
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> Option<String> {
        let full_name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if !full_name.is_empty() {
            return Some(full_name);
        }

        self.username
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| self.email.clone())
    }
}

/// Derived authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    pub fn from_token_presence(has_access_token: bool) -> Self {
        if has_access_token {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Unauthenticated => write!(f, "Unauthenticated"),
            AuthState::Authenticated => write!(f, "Authenticated"),
        }
    }
}

/// Snapshot of the session as seen by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub state: AuthState,
    pub user: Option<UserProfile>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }
}

/// Wire body for the login endpoint.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Login response. Accepts both the short and the `*_token` field names.
#[derive(Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(alias = "access_token")]
    pub access: String,
    #[serde(alias = "refresh_token")]
    pub refresh: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Wire body for the refresh endpoint.
#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Refresh response. `refresh` is present only when the backend rotates it.
#[derive(Deserialize)]
pub(crate) struct RefreshResponse {
    #[serde(alias = "access_token")]
    pub access: String,
    #[serde(default, alias = "refresh_token")]
    pub refresh: Option<String>,
}
