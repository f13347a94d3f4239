pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod lifecycle;
pub mod providers;
pub mod store;

pub use config::Config;
pub use error::AuthError;

use std::sync::Arc;

use api::session::CookieKey;
use crypto::CryptoEngine;
use lifecycle::TokenLifecycle;
use providers::{GoogleProvider, OAuthProvider};
use store::TokenStore;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub crypto: Arc<CryptoEngine>,
    pub cookie_key: CookieKey,
    pub lifecycle: TokenLifecycle,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire up state around an explicitly constructed provider.
    pub async fn with_provider(
        config: Config,
        provider: Arc<dyn OAuthProvider>,
    ) -> Result<Self, AuthError> {
        let crypto = Arc::new(CryptoEngine::new(&config.master_key, &config.hmac_secret)?);
        let cookie_key = CookieKey::from_material(&crypto.cookie_key_material()?);
        let store = TokenStore::new(&config.database_url, crypto.clone()).await?;
        store.migrate().await?;

        let lifecycle = TokenLifecycle::new(
            provider,
            store,
            config.google_scope.clone(),
            config.google_redirect_uri.clone(),
        );

        Ok(Self {
            config,
            crypto,
            cookie_key,
            lifecycle,
        })
    }

    /// Production wiring: Google as the provider.
    pub async fn from_config(config: Config) -> Result<Self, AuthError> {
        let provider = Arc::new(GoogleProvider::from_config(&config));
        Self::with_provider(config, provider).await
    }
}
