use axum::http::{header, HeaderValue, Method};
use reviser::api;
use reviser::app_state::AppState;
use reviser::config::{self, ReviserConfig};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // .env may carry REVISER_* settings and the AI key, so load it first.
    config::load_env_file();

    let config = ReviserConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Invalid reviser configuration");
        std::io::Error::other(e.to_string())
    })?;
    let bind_addr = config.bind_addr.clone();

    let allowed_origins = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    let app_state = AppState::from_config(config).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialise AI client");
        std::io::Error::other(e.to_string())
    })?;
    let api_state = api::ApiState { app_state };

    let app = api::router().with_state(api_state).layer(cors);

    tracing::info!(addr = %bind_addr, "Starting reviser HTTP server");
    let listener = TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await
}
