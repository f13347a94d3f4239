//! Private (encrypted and authenticated) cookies: the user this browser
//! authorized as, and the login state it was handed before leaving for the
//! provider. Values the browser tampers with or makes up read back as absent.

use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};

use crate::SharedState;

pub const USER_COOKIE: &str = "login_user";
pub const STATE_COOKIE: &str = "login_state";

pub type SessionJar = PrivateCookieJar<CookieKey>;

/// Key for the private cookie jar, derived from `HMAC_SECRET`.
#[derive(Clone)]
pub struct CookieKey(Key);

impl CookieKey {
    pub fn from_material(material: &[u8; 64]) -> Self {
        Self(Key::from(&material[..]))
    }
}

impl From<CookieKey> for Key {
    fn from(key: CookieKey) -> Self {
        key.0
    }
}

impl FromRef<SharedState> for CookieKey {
    fn from_ref(state: &SharedState) -> Self {
        state.cookie_key.clone()
    }
}

fn private_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn current_user<K>(jar: &PrivateCookieJar<K>) -> Option<String> {
    jar.get(USER_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|u| !u.is_empty())
}

pub fn remember_user<K>(jar: PrivateCookieJar<K>, username: &str) -> PrivateCookieJar<K> {
    jar.add(private_cookie(USER_COOKIE, username.to_string()))
}

pub fn forget_user<K>(jar: PrivateCookieJar<K>) -> PrivateCookieJar<K> {
    jar.remove(Cookie::build(USER_COOKIE).path("/"))
}

/// Bind a freshly issued login state to this browser.
pub fn hold_state<K>(jar: PrivateCookieJar<K>, login_state: &str) -> PrivateCookieJar<K> {
    jar.add(private_cookie(STATE_COOKIE, login_state.to_string()))
}

/// The login state this browser was issued, if any. It is single-use: the
/// returned jar clears it.
pub fn take_state<K>(jar: PrivateCookieJar<K>) -> (PrivateCookieJar<K>, Option<String>) {
    match jar.get(STATE_COOKIE) {
        Some(c) => {
            let value = c.value().to_string();
            (jar.remove(Cookie::build(STATE_COOKIE).path("/")), Some(value))
        }
        None => (jar, None),
    }
}
