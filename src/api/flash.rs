//! One-shot flash messages carried across a redirect in a cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine as _;

pub const FLASH_COOKIE: &str = "flash";

/// Append `message` to the pending flash messages.
pub fn push(jar: CookieJar, message: impl Into<String>) -> CookieJar {
    let mut messages = peek(&jar);
    messages.push(message.into());

    let encoded = serde_json::to_vec(&messages)
        .map(|json| base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json))
        .unwrap_or_default();

    jar.add(
        Cookie::build((FLASH_COOKIE, encoded))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Pending messages, without consuming them.
pub fn peek(jar: &CookieJar) -> Vec<String> {
    jar.get(FLASH_COOKIE)
        .and_then(|c| {
            base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(c.value())
                .ok()
        })
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

/// Pending messages, and a jar that clears them.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<String>) {
    let messages = peek(&jar);
    if messages.is_empty() {
        return (jar, messages);
    }
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), messages)
}
