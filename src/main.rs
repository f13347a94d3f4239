use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use google_login::{api, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "google_login=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("google-login v{}", env!("CARGO_PKG_VERSION"));
    info!("Redirect URI: {}", config.google_redirect_uri);

    let addr = config.bind_addr();
    let state: SharedState = Arc::new(AppState::from_config(config).await?);
    info!("Database ready ✓");

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
