use anyhow::{Context, Result};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    pub base_url: String,

    // ── Database (SQLite, single `user_tokens` table) ───────────────────
    pub database_url: String,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// 32-byte base64-encoded master key for AES-256-GCM encryption.
    pub master_key: String,
    /// Base64-encoded HMAC key; signs login states and keys the private cookies.
    pub hmac_secret: String,

    // ── Google ──────────────────────────────────────────────────────────
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub google_scope: String,
    /// User addressed by refresh/reuse/forget when the request names none.
    pub google_test_email: Option<String>,
    pub google_auth_url: String,
    pub google_token_url: String,
    pub google_userinfo_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = var("BASE_URL").unwrap_or_else(|| "http://127.0.0.1:5000".into());
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Config {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".into()),
            port: var("PORT")
                .unwrap_or_else(|| "5000".into())
                .parse()
                .context("Invalid PORT")?,
            google_redirect_uri: var("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|| format!("{base_url}/google/authorized")),
            base_url,

            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite://google.db".into()),

            master_key: var("MASTER_KEY").context("MASTER_KEY is required (32 bytes, base64)")?,
            hmac_secret: var("HMAC_SECRET").context("HMAC_SECRET is required (base64)")?,

            google_client_id: var("GOOGLE_CLIENT_ID").context("GOOGLE_CLIENT_ID is required")?,
            google_client_secret: var("GOOGLE_CLIENT_SECRET")
                .context("GOOGLE_CLIENT_SECRET is required")?,
            google_scope: var("GOOGLE_SCOPE").unwrap_or_else(|| "email".into()),
            google_test_email: var("GOOGLE_TEST_EMAIL").filter(|s| !s.is_empty()),
            google_auth_url: var("GOOGLE_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.into()),
            google_token_url: var("GOOGLE_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.into()),
            google_userinfo_url: var("GOOGLE_USERINFO_URL")
                .unwrap_or_else(|| DEFAULT_USERINFO_URL.into()),
        })
    }

    /// Address the HTTP listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
