/// Unified error type for the google-login service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // ── Flow Errors ─────────────────────────────────────────────────────
    #[error("You did not authorize the request")]
    Declined,

    #[error("Invalid state parameter")]
    InvalidState,

    #[error("OAuth session expired")]
    StateExpired,

    // ── Token Errors ────────────────────────────────────────────────────
    #[error("User {0} is not known yet")]
    UnknownUser(String),

    #[error("No refresh token stored for user {0}")]
    NoRefreshToken(String),

    #[error("No user selected")]
    NoUserSelected,

    // ── Provider Errors ─────────────────────────────────────────────────
    #[error("OAuth provider error: {0}")]
    ProviderError(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        AuthError::Database(e.to_string())
    }
}

impl AuthError {
    /// Stable machine-readable code, logged with every failed flow step.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Declined => "declined",
            AuthError::InvalidState => "invalid_state",
            AuthError::StateExpired => "state_expired",
            AuthError::UnknownUser(_) => "unknown_user",
            AuthError::NoRefreshToken(_) => "no_refresh_token",
            AuthError::NoUserSelected => "no_user_selected",
            AuthError::ProviderError(_) => "provider_error",
            AuthError::RefreshFailed(_) => "refresh_failed",
            AuthError::CryptoError(_) => "crypto_error",
            AuthError::Database(_) => "database_error",
            AuthError::Internal(_) => "internal_error",
        }
    }
}
