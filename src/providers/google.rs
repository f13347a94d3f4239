use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{AuthorizationRequest, OAuthProvider, Profile, TokenSet};
use crate::config::Config;
use crate::error::AuthError;

/// Google OAuth 2.0 provider.
///
/// Token lifetime: 1 hour.
/// Refresh: requires `access_type=offline`; Google only re-issues a refresh
/// token on forced consent.
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    endpoints: GoogleEndpoints,
    http: reqwest::Client,
    timeout: Duration,
}

/// Upper bound for a single call to Google.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google endpoint URLs; overridable so the provider can point at a stand-in.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: crate::config::DEFAULT_AUTH_URL.into(),
            token_url: crate::config::DEFAULT_TOKEN_URL.into(),
            userinfo_url: crate::config::DEFAULT_USERINFO_URL.into(),
        }
    }
}

// Raw token response from Google's token endpoint
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<u64>,
    scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl From<GoogleTokenResponse> for TokenSet {
    fn from(resp: GoogleTokenResponse) -> Self {
        TokenSet {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            token_type: resp.token_type,
            expires_in: resp.expires_in,
            scope: resp.scope,
        }
    }
}

impl GoogleProvider {
    pub fn new(client_id: String, client_secret: String, endpoints: GoogleEndpoints) -> Self {
        Self {
            client_id,
            client_secret,
            endpoints,
            http: reqwest::Client::new(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            GoogleEndpoints {
                auth_url: config.google_auth_url.clone(),
                token_url: config.google_token_url.clone(),
                userinfo_url: config.google_userinfo_url.clone(),
            },
        )
    }

    async fn post_token(
        &self,
        form: &[(&str, &str)],
        fail: fn(String) -> AuthError,
    ) -> Result<TokenSet, AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.token_url)
            .timeout(self.timeout)
            .form(form)
            .send()
            .await
            .map_err(|e| fail(format!("Token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(fail(format!("Google token endpoint returned {status}: {body}")));
        }

        let token_resp: GoogleTokenResponse = resp
            .json()
            .await
            .map_err(|e| fail(format!("Failed to parse token response: {e}")))?;

        Ok(token_resp.into())
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn id(&self) -> &str {
        "google"
    }

    fn display_name(&self) -> &str {
        "Google"
    }

    fn auth_url(&self, request: &AuthorizationRequest<'_>) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", request.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", request.scope)
            .append_pair("state", request.state);
        if request.offline {
            query.append_pair("access_type", "offline");
        }
        if request.force_consent {
            query.append_pair("prompt", "consent");
        }

        let separator = if self.endpoints.auth_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.endpoints.auth_url, separator, query.finish())
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, AuthError> {
        self.post_token(
            &[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ],
            AuthError::ProviderError,
        )
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        self.post_token(
            &[
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ],
            AuthError::RefreshFailed,
        )
        .await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, AuthError> {
        let resp = self
            .http
            .get(&self.endpoints.userinfo_url)
            .timeout(self.timeout)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Userinfo request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::ProviderError(format!(
                "Google userinfo returned {status}: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse userinfo: {e}")))
    }

    fn token_ttl(&self) -> Duration {
        Duration::from_secs(3600) // Google tokens expire in 1 hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleProvider {
        GoogleProvider::new("client-123".into(), "s3cret".into(), GoogleEndpoints::default())
    }

    fn request<'a>(force: bool) -> AuthorizationRequest<'a> {
        AuthorizationRequest {
            scope: "email",
            redirect_uri: "http://127.0.0.1:5000/google/authorized",
            state: "abc",
            offline: true,
            force_consent: force,
        }
    }

    #[test]
    fn test_auth_url_carries_required_params() {
        let url = url::Url::parse(&provider().auth_url(&request(false))).unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));

        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:5000/google/authorized");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "email");
        assert_eq!(params["state"], "abc");
        assert_eq!(params["access_type"], "offline");
        assert!(!params.contains_key("prompt"));
    }

    #[test]
    fn test_force_adds_consent_prompt() {
        let url = url::Url::parse(&provider().auth_url(&request(true))).unwrap();
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "prompt" && v == "consent"));
    }

    #[test]
    fn test_client_secret_never_in_auth_url() {
        assert!(!provider().auth_url(&request(true)).contains("s3cret"));
    }

    #[test]
    fn test_token_response_without_type_defaults_to_bearer() {
        let resp: GoogleTokenResponse =
            serde_json::from_str(r#"{"access_token":"at","expires_in":3599}"#).unwrap();
        let tokens: TokenSet = resp.into();
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, Some(3599));
        assert!(tokens.refresh_token.is_none());
    }

    #[test]
    fn test_token_response_missing_access_token_is_error() {
        assert!(serde_json::from_str::<GoogleTokenResponse>(r#"{"expires_in":3599}"#).is_err());
    }
}
