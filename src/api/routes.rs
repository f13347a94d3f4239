//! Browser-facing route handlers.
//!
//! Every handler ends in a redirect carrying a flash message, except the
//! index page (which renders and clears them) and the health check.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::flash;
use super::session::{self, SessionJar};
use crate::error::AuthError;
use crate::lifecycle::ReuseOutcome;
use crate::SharedState;

// =============================================================================
// Router
// =============================================================================

pub fn app_router(state: SharedState) -> Router {
    let prefix = provider_path(&state, "");

    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .nest(&prefix, provider_router())
        .with_state(state)
}

fn provider_router() -> Router<SharedState> {
    Router::new()
        .route("/login", get(login))
        .route("/force", get(force))
        .route("/authorized", get(authorized))
        .route("/refresh", get(refresh))
        .route("/reuse", get(reuse))
        .route("/forget", get(forget))
}

fn provider_path(state: &SharedState, action: &str) -> String {
    format!("/{}{}", state.lifecycle.provider().id(), action)
}

// =============================================================================
// Helpers
// =============================================================================

/// Flash `err` and send the browser where it can recover.
fn fail(state: &SharedState, jar: CookieJar, err: AuthError) -> Response {
    let target = match err {
        AuthError::UnknownUser(_) | AuthError::NoUserSelected => provider_path(state, "/login"),
        AuthError::NoRefreshToken(_) => provider_path(state, "/force"),
        _ => "/".to_string(),
    };
    warn!(code = err.code(), redirect = %target, "{err}");

    (flash::push(jar, err.to_string()), Redirect::to(&target)).into_response()
}

fn done(jar: CookieJar, message: String) -> Response {
    (flash::push(jar, message), Redirect::to("/")).into_response()
}

/// The user this browser authorized as, then the configured default.
fn selected_user(state: &SharedState, session: &SessionJar) -> Result<String, AuthError> {
    session::current_user(session)
        .or_else(|| state.config.google_test_email.clone())
        .ok_or(AuthError::NoUserSelected)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// =============================================================================
// Pages
// =============================================================================

async fn index(
    State(state): State<SharedState>,
    jar: CookieJar,
    session: SessionJar,
) -> impl IntoResponse {
    let (jar, messages) = flash::take(jar);
    let provider = state.lifecycle.provider().display_name();
    let current = session::current_user(&session);

    let mut body = String::from("<!doctype html>\n<html><head><title>Login</title></head><body>\n");
    if !messages.is_empty() {
        body.push_str("<ul class=\"flashes\">\n");
        for m in &messages {
            body.push_str(&format!("  <li>{}</li>\n", escape_html(m)));
        }
        body.push_str("</ul>\n");
    }
    if let Some(user) = current {
        body.push_str(&format!("<p>Signed in as {}</p>\n", escape_html(&user)));
    }
    for (action, label) in [
        ("/login", format!("Login with {provider}")),
        ("/force", format!("Login with {provider} (force consent)")),
        ("/reuse", "Reuse session".to_string()),
        ("/refresh", "Refresh session".to_string()),
        ("/forget", "Forget user".to_string()),
    ] {
        body.push_str(&format!(
            "<p><a href=\"{}\">{}</a></p>\n",
            provider_path(&state, action),
            label
        ));
    }
    body.push_str("</body></html>\n");

    (jar, Html(body))
}

async fn status(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "google-login",
        "provider": state.lifecycle.provider().id(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// OAuth flow
// =============================================================================

/// GET /google/login — redirect to the consent screen, offline access.
async fn login(State(state): State<SharedState>, jar: CookieJar, session: SessionJar) -> Response {
    start(&state, jar, session, false)
}

/// GET /google/force — same as login but always re-prompts for consent, which
/// makes Google issue a fresh refresh token.
async fn force(State(state): State<SharedState>, jar: CookieJar, session: SessionJar) -> Response {
    start(&state, jar, session, true)
}

fn start(state: &SharedState, jar: CookieJar, session: SessionJar, force_consent: bool) -> Response {
    match state.crypto.sign_state(Utc::now().timestamp()) {
        Ok(login_state) => {
            let url = state.lifecycle.authorization_url(&login_state, force_consent);
            (
                session::hold_state(session, &login_state),
                Redirect::temporary(&url),
            )
                .into_response()
        }
        Err(e) => fail(state, jar, e),
    }
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /google/authorized — provider callback. The `state` must be the one
/// this browser was handed by `start`.
async fn authorized(
    State(state): State<SharedState>,
    jar: CookieJar,
    session: SessionJar,
    Query(q): Query<CallbackQuery>,
) -> Response {
    let (session, held) = session::take_state(session);

    let Some(code) = q.code.filter(|c| !c.is_empty()) else {
        if let Some(reason) = q.error.as_deref() {
            warn!(reason, "Provider reported authorization error");
        }
        return (session, fail(&state, jar, AuthError::Declined)).into_response();
    };

    let verified = match (q.state.as_deref(), held.as_deref()) {
        (Some(returned), Some(issued)) if returned == issued => {
            state.crypto.verify_state(returned, Utc::now().timestamp())
        }
        _ => Err(AuthError::InvalidState),
    };
    if let Err(e) = verified {
        return (session, fail(&state, jar, e)).into_response();
    }

    match state.lifecycle.complete_authorization(&code).await {
        Ok(signed_in) => {
            let session = session::remember_user(session, &signed_in.token.username);
            (
                session,
                done(jar, format!("Authorized as {}", signed_in.profile.email)),
            )
                .into_response()
        }
        Err(e) => (session, fail(&state, jar, e)).into_response(),
    }
}

/// GET /google/refresh — trade the stored refresh token for a new access token.
async fn refresh(State(state): State<SharedState>, jar: CookieJar, session: SessionJar) -> Response {
    let username = match selected_user(&state, &session) {
        Ok(u) => u,
        Err(e) => return fail(&state, jar, e),
    };

    match state.lifecycle.refresh(&username).await {
        Ok(refreshed) => done(
            jar,
            format!("Refreshed logging session as {}", refreshed.profile.email),
        ),
        Err(e) => fail(&state, jar, e),
    }
}

/// GET /google/reuse — use the stored token, refreshing it first if expired.
async fn reuse(State(state): State<SharedState>, jar: CookieJar, session: SessionJar) -> Response {
    let username = match selected_user(&state, &session) {
        Ok(u) => u,
        Err(e) => return fail(&state, jar, e),
    };

    match state.lifecycle.reuse(&username).await {
        Ok(ReuseOutcome::Reused { session, remaining }) => done(
            jar,
            format!(
                "Remaining {remaining} s. Reused logging session as {}",
                session.profile.email
            ),
        ),
        Ok(ReuseOutcome::Refreshed { session, .. }) => {
            let jar = flash::push(
                jar,
                format!("Authorization token for user {username} has expired"),
            );
            done(
                jar,
                format!("Refreshed logging session as {}", session.profile.email),
            )
        }
        Err(e) => fail(&state, jar, e),
    }
}

/// GET /google/forget — drop the stored tokens of the selected user.
async fn forget(State(state): State<SharedState>, jar: CookieJar, session: SessionJar) -> Response {
    let username = match selected_user(&state, &session) {
        Ok(u) => u,
        Err(e) => return fail(&state, jar, e),
    };
    let session = session::forget_user(session);

    let outcome = match state.lifecycle.forget(&username).await {
        Ok(true) => done(jar, format!("Forgot user {username}")),
        Ok(false) => fail(&state, jar, AuthError::UnknownUser(username)),
        Err(e) => fail(&state, jar, e),
    };
    (session, outcome).into_response()
}
