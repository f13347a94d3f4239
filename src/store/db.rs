//! SQLite-backed token store. One table, `user_tokens`, with at most one row
//! per username. Token columns hold AES-256-GCM ciphertext.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::crypto::CryptoEngine;
use crate::error::AuthError;

/// Token store backed by SQLite.
#[derive(Clone)]
pub struct TokenStore {
    pool: SqlitePool,
    crypto: Arc<CryptoEngine>,
}

impl TokenStore {
    pub async fn new(db_url: &str, crypto: Arc<CryptoEngine>) -> Result<Self, AuthError> {
        let options = SqliteConnectOptions::from_str(db_url)
            .map_err(|e| AuthError::Database(format!("Invalid DATABASE_URL: {e}")))?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if db_url.contains(":memory:") {
            // An in-memory database lives and dies with its one connection.
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AuthError::Database(format!("Failed to open SQLite database: {e}")))?;

        Ok(Self { pool, crypto })
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_tokens (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                provider_id     TEXT NOT NULL,
                access_token    TEXT NOT NULL,
                expires_at      INTEGER NOT NULL,
                refresh_token   TEXT,
                updated_at      INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up the token row for `username`.
    pub async fn get(&self, username: &str) -> Result<Option<UserToken>, AuthError> {
        let row = sqlx::query(
            r#"
            SELECT username, provider_id, access_token, expires_at, refresh_token, updated_at
            FROM user_tokens
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| self.decode_row(&r)).transpose()
    }

    /// Insert a row unless one already exists for the username; either way
    /// return what is stored. An existing row is left untouched.
    pub async fn get_or_create(&self, new: &NewUserToken) -> Result<UserToken, AuthError> {
        let (enc_access, enc_refresh) = self.encrypt_tokens(new)?;

        sqlx::query(
            r#"
            INSERT INTO user_tokens
                (username, provider_id, access_token, expires_at, refresh_token, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(&new.username)
        .bind(&new.provider_id)
        .bind(&enc_access)
        .bind(new.expires_at)
        .bind(&enc_refresh)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        self.get(&new.username)
            .await?
            .ok_or_else(|| AuthError::Internal(format!("row for {} vanished", new.username)))
    }

    /// Insert or overwrite the token fields for the username. A missing
    /// refresh token keeps the stored one.
    pub async fn upsert(&self, new: &NewUserToken) -> Result<UserToken, AuthError> {
        let (enc_access, enc_refresh) = self.encrypt_tokens(new)?;

        sqlx::query(
            r#"
            INSERT INTO user_tokens
                (username, provider_id, access_token, expires_at, refresh_token, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (username)
            DO UPDATE SET
                provider_id = excluded.provider_id,
                access_token = excluded.access_token,
                expires_at = excluded.expires_at,
                refresh_token = COALESCE(excluded.refresh_token, user_tokens.refresh_token),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&new.username)
        .bind(&new.provider_id)
        .bind(&enc_access)
        .bind(new.expires_at)
        .bind(&enc_refresh)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        self.get(&new.username)
            .await?
            .ok_or_else(|| AuthError::Internal(format!("row for {} vanished", new.username)))
    }

    /// Update a row's tokens after a refresh.
    pub async fn update_refreshed(
        &self,
        username: &str,
        access_token: &str,
        expires_at: i64,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let enc_access = self.crypto.seal(access_token)?;
        let enc_refresh = refresh_token.map(|rt| self.crypto.seal(rt)).transpose()?;

        let affected = sqlx::query(
            r#"
            UPDATE user_tokens
            SET access_token = ?1,
                expires_at = ?2,
                refresh_token = COALESCE(?3, refresh_token),
                updated_at = ?4
            WHERE username = ?5
            "#,
        )
        .bind(&enc_access)
        .bind(expires_at)
        .bind(&enc_refresh)
        .bind(Utc::now().timestamp())
        .bind(username)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(AuthError::UnknownUser(username.to_string()));
        }

        Ok(())
    }

    /// Delete the row for `username`. Returns whether a row was removed.
    pub async fn delete(&self, username: &str) -> Result<bool, AuthError> {
        let affected = sqlx::query("DELETE FROM user_tokens WHERE username = ?1")
            .bind(username)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    /// Number of stored rows.
    pub async fn count(&self) -> Result<i64, AuthError> {
        let row = sqlx::query("SELECT COUNT(*) FROM user_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }

    /// Expose the pool for direct use (tests, diagnostics).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn encrypt_tokens(&self, new: &NewUserToken) -> Result<(String, Option<String>), AuthError> {
        let enc_access = self.crypto.seal(&new.access_token)?;
        let enc_refresh = new
            .refresh_token
            .as_deref()
            .map(|rt| self.crypto.seal(rt))
            .transpose()?;
        Ok((enc_access, enc_refresh))
    }

    fn decode_row(&self, row: &SqliteRow) -> Result<UserToken, AuthError> {
        let enc_access: String = row.try_get("access_token")?;
        let enc_refresh: Option<String> = row.try_get("refresh_token")?;

        let refresh_token = match enc_refresh {
            Some(ref rt) if !rt.is_empty() => Some(self.crypto.open(rt)?),
            _ => None,
        };

        Ok(UserToken {
            username: row.try_get("username")?,
            provider_id: row.try_get("provider_id")?,
            access_token: self.crypto.open(&enc_access)?,
            expires_at: row.try_get("expires_at")?,
            refresh_token,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

// ── Types ────────────────────────────────────────────────────────────────────

/// A stored token row, decrypted.
#[derive(Debug, Clone)]
pub struct UserToken {
    pub username: String,
    pub provider_id: String,
    pub access_token: String,
    /// Absolute unix timestamp, seconds.
    pub expires_at: i64,
    pub refresh_token: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewUserToken {
    pub username: String,
    pub provider_id: String,
    pub access_token: String,
    pub expires_at: i64,
    pub refresh_token: Option<String>,
}
