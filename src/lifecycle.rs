//! Token lifecycle: authorize, reuse, refresh and forget a user's tokens.
//!
//! Provider-agnostic; the HTTP layer only turns outcomes into flash messages.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::AuthError;
use crate::providers::{AuthorizationRequest, OAuthProvider, Profile, TokenSet};
use crate::store::{NewUserToken, TokenStore, UserToken};

/// Seconds left before `expires_at`. Zero or negative means the access token
/// must be refreshed before use.
pub fn remaining_seconds(expires_at: i64, now: i64) -> i64 {
    expires_at - now
}

/// A user whose tokens were just used against the provider.
#[derive(Debug, Clone)]
pub struct Session {
    pub profile: Profile,
    pub token: UserToken,
}

#[derive(Debug, Clone)]
pub enum ReuseOutcome {
    /// The stored access token was still valid.
    Reused { session: Session, remaining: i64 },
    /// The stored access token had expired and was refreshed first.
    Refreshed { session: Session, expired_for: i64 },
}

impl ReuseOutcome {
    pub fn session(&self) -> &Session {
        match self {
            ReuseOutcome::Reused { session, .. } | ReuseOutcome::Refreshed { session, .. } => {
                session
            }
        }
    }
}

pub struct TokenLifecycle {
    provider: Arc<dyn OAuthProvider>,
    store: TokenStore,
    scope: String,
    redirect_uri: String,
}

impl TokenLifecycle {
    pub fn new(
        provider: Arc<dyn OAuthProvider>,
        store: TokenStore,
        scope: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            store,
            scope: scope.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn provider(&self) -> &dyn OAuthProvider {
        self.provider.as_ref()
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Authorization URL requesting offline access, optionally forcing consent.
    pub fn authorization_url(&self, state: &str, force_consent: bool) -> String {
        self.provider.auth_url(&AuthorizationRequest {
            scope: &self.scope,
            redirect_uri: &self.redirect_uri,
            state,
            offline: true,
            force_consent,
        })
    }

    /// Exchange a callback code, identify the user and store their tokens.
    pub async fn complete_authorization(&self, code: &str) -> Result<Session, AuthError> {
        let tokens = self.provider.exchange_code(code, &self.redirect_uri).await?;
        let profile = self.provider.fetch_profile(&tokens.access_token).await?;
        let expires_at = self.expires_at(&tokens, Utc::now().timestamp());

        let token = self
            .store
            .upsert(&NewUserToken {
                username: profile.email.clone(),
                provider_id: profile.id.clone(),
                access_token: tokens.access_token,
                expires_at,
                refresh_token: tokens.refresh_token,
            })
            .await?;

        info!(
            provider = self.provider.id(),
            username = %token.username,
            has_refresh_token = token.refresh_token.is_some(),
            "Authorized user"
        );
        Ok(Session { profile, token })
    }

    /// Trade the stored refresh token for a new access token.
    pub async fn refresh(&self, username: &str) -> Result<Session, AuthError> {
        let stored = self.load(username).await?;
        let refresh_token = stored
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::NoRefreshToken(username.to_string()))?;

        let tokens = self.provider.refresh_token(refresh_token).await?;
        let expires_at = self.expires_at(&tokens, Utc::now().timestamp());

        self.store
            .update_refreshed(
                username,
                &tokens.access_token,
                expires_at,
                tokens.refresh_token.as_deref(),
            )
            .await?;

        let profile = self.provider.fetch_profile(&tokens.access_token).await?;
        let token = self.load(username).await?;

        info!(provider = self.provider.id(), username, expires_at, "Refreshed token");
        Ok(Session { profile, token })
    }

    /// Use the stored access token, refreshing it first when it has expired.
    pub async fn reuse(&self, username: &str) -> Result<ReuseOutcome, AuthError> {
        let stored = self.load(username).await?;
        let remaining = remaining_seconds(stored.expires_at, Utc::now().timestamp());

        if remaining <= 0 {
            warn!(username, remaining, "Access token expired, refreshing");
            let session = self.refresh(username).await?;
            return Ok(ReuseOutcome::Refreshed {
                session,
                expired_for: -remaining,
            });
        }

        let profile = self.provider.fetch_profile(&stored.access_token).await?;
        Ok(ReuseOutcome::Reused {
            session: Session {
                profile,
                token: stored,
            },
            remaining,
        })
    }

    /// Drop everything stored for `username`. Returns whether a row existed.
    pub async fn forget(&self, username: &str) -> Result<bool, AuthError> {
        let removed = self.store.delete(username).await?;
        if removed {
            info!(username, "Forgot user");
        }
        Ok(removed)
    }

    async fn load(&self, username: &str) -> Result<UserToken, AuthError> {
        self.store
            .get(username)
            .await?
            .ok_or_else(|| AuthError::UnknownUser(username.to_string()))
    }

    fn expires_at(&self, tokens: &TokenSet, now: i64) -> i64 {
        let lifetime = match tokens.expires_in {
            Some(secs) if secs > 0 => secs,
            _ => self.provider.token_ttl().as_secs(),
        };
        now.saturating_add(i64::try_from(lifetime).unwrap_or(i64::MAX))
    }
}
