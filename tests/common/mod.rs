#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use base64::Engine as _;
use google_login::providers::{AuthorizationRequest, OAuthProvider, Profile, TokenSet};
use google_login::{AppState, AuthError, Config, SharedState};
use http_body_util::BodyExt;
use tower::ServiceExt;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn test_config(test_email: Option<&str>) -> Config {
    let master = base64::engine::general_purpose::STANDARD.encode([0x42u8; 32]);
    let hmac = base64::engine::general_purpose::STANDARD.encode([0x43u8; 32]);
    let mut vars: HashMap<&str, String> = HashMap::from([
        ("DATABASE_URL", "sqlite::memory:".to_string()),
        ("MASTER_KEY", master),
        ("HMAC_SECRET", hmac),
        ("GOOGLE_CLIENT_ID", "test-client".to_string()),
        ("GOOGLE_CLIENT_SECRET", "test-secret".to_string()),
    ]);
    if let Some(email) = test_email {
        vars.insert("GOOGLE_TEST_EMAIL", email.to_string());
    }
    Config::from_lookup(|k| vars.get(k).cloned()).expect("test config")
}

/// Provider stand-in: code `denied` is rejected, anything else maps to
/// `bob@example.com`.
#[derive(Default)]
pub struct FakeProvider {
    pub refreshes: AtomicUsize,
    pub profile_fetches: AtomicUsize,
}

impl FakeProvider {
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthProvider for FakeProvider {
    fn id(&self) -> &str {
        "google"
    }

    fn display_name(&self) -> &str {
        "Google"
    }

    fn auth_url(&self, request: &AuthorizationRequest<'_>) -> String {
        let mut url = url::Url::parse("https://accounts.test/auth").unwrap();
        url.query_pairs_mut()
            .append_pair("redirect_uri", request.redirect_uri)
            .append_pair("state", request.state);
        if request.force_consent {
            url.query_pairs_mut().append_pair("prompt", "consent");
        }
        url.to_string()
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<TokenSet, AuthError> {
        if code == "denied" {
            return Err(AuthError::ProviderError("invalid_grant".into()));
        }
        Ok(TokenSet {
            access_token: format!("access-{code}"),
            refresh_token: Some("refresh-token".into()),
            token_type: "Bearer".into(),
            expires_in: Some(3600),
            scope: Some("email".into()),
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenSet, AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(TokenSet {
            access_token: "access-refreshed".into(),
            refresh_token: None,
            token_type: "Bearer".into(),
            expires_in: Some(3600),
            scope: None,
        })
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<Profile, AuthError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Profile {
            id: "42".into(),
            email: "bob@example.com".into(),
            name: Some("Bob".into()),
            picture: None,
        })
    }
}

pub async fn test_state(test_email: Option<&str>) -> (SharedState, Arc<FakeProvider>) {
    setup_tracing();
    let provider = Arc::new(FakeProvider::default());
    let state = AppState::with_provider(test_config(test_email), provider.clone())
        .await
        .expect("app state");
    (Arc::new(state), provider)
}

/// Minimal cookie-keeping client over the router.
pub struct Browser {
    app: axum::Router,
    cookies: HashMap<String, String>,
}

impl Browser {
    pub fn new(state: SharedState) -> Self {
        Self {
            app: google_login::api::router(state),
            cookies: HashMap::new(),
        }
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        let mut req = Request::builder().uri(uri);
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            req = req.header(header::COOKIE, cookie);
        }

        let resp = self
            .app
            .clone()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();

        for set in resp.headers().get_all(header::SET_COOKIE) {
            let set = set.to_str().unwrap();
            let pair = set.split(';').next().unwrap();
            let (name, value) = pair.split_once('=').unwrap();
            let expired = set.to_ascii_lowercase().contains("max-age=0");
            if value.is_empty() || expired {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
        resp
    }

    /// Plant a cookie the server never issued.
    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Flash messages shown (and cleared) by the index page.
    pub async fn flashes(&mut self) -> Vec<String> {
        let resp = self.get("/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_string(resp).await;
        body.lines()
            .filter_map(|l| {
                l.trim()
                    .strip_prefix("<li>")
                    .and_then(|l| l.strip_suffix("</li>"))
            })
            .map(str::to_string)
            .collect()
    }
}

pub fn location(resp: &Response<Body>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .unwrap()
        .to_string()
}

pub async fn body_string(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Log `browser` in as bob@example.com through the full redirect round trip.
pub async fn authorize(browser: &mut Browser) {
    let login = login_state(browser).await;
    browser
        .get(&format!("/google/authorized?code=abc&state={login}"))
        .await;
    browser.flashes().await;
}

/// Follow `/google/login` and pull the signed state out of the redirect.
pub async fn login_state(browser: &mut Browser) -> String {
    let resp = browser.get("/google/login").await;
    let url = url::Url::parse(&location(&resp)).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state param")
}
