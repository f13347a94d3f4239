use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AuthError;

/// A set of tokens returned from an OAuth provider after code exchange or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// The user as reported by the provider's userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Provider subject id.
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Parameters of an authorization redirect.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub scope: &'a str,
    pub redirect_uri: &'a str,
    /// Opaque, signed value echoed back on the callback.
    pub state: &'a str,
    /// Ask for a refresh token.
    pub offline: bool,
    /// Re-prompt for consent even if the user already granted it.
    pub force_consent: bool,
}

/// Trait that an OAuth2 provider must implement.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Unique provider identifier, also the route prefix (e.g., "google").
    fn id(&self) -> &str;

    /// Human-readable display name (e.g., "Google").
    fn display_name(&self) -> &str;

    /// Build the authorization URL that the user should be redirected to.
    fn auth_url(&self, request: &AuthorizationRequest<'_>) -> String;

    /// Exchange an authorization code for an access token (and optionally refresh token).
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, AuthError>;

    /// Obtain a new access token using a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError>;

    /// Fetch the profile of the user owning `access_token`.
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, AuthError>;

    /// Lifetime assumed when the token endpoint omits `expires_in`.
    fn token_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }
}
