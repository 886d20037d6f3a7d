use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),
}

impl CoreError {
    /// Whether the error means the user has to sign in again.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, CoreError::Auth(e) if e.ends_session())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
