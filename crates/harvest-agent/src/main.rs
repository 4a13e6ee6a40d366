// Harvest agent service: AG-UI endpoint, dialogue and Deep Research.

use anyhow::{Context, Result};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use harvest_agent::config::AgentSettings;
use harvest_agent::routes;
use harvest_agent::state::AgentState;
use harvest_agent::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = AgentSettings::from_env()?;
    telemetry::init(
        &settings.log_level,
        settings.log_json,
        settings.otel_tracing_enabled,
    )?;

    let cors = if settings.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = settings
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let bind_addr = format!("{}:{}", settings.host, settings.port);
    let state = AgentState::from_settings(settings).await;

    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "agent listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received, shutting down");
        })
        .await?;

    telemetry::shutdown();
    Ok(())
}
