use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use castway_core::{parse_port, LaunchConfig, Player, ServerUrls};
use castway_runner::{resolve_server, Supervisor};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod page;

#[derive(Clone)]
struct AppState {
    app_port: u16,
    scrcpy: ServerUrls,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let app_port = read_port("PORT", 3000)?;
    let bind_host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let scrcpy_port = read_port("SCRCPY_PORT", 8009)?;
    let scrcpy_host = std::env::var("SCRCPY_HOST").unwrap_or_else(|_| "localhost".to_string());

    let state = AppState {
        app_port,
        scrcpy: ServerUrls::new(scrcpy_host.clone(), scrcpy_port),
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/scrcpy-url", get(scrcpy_url))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind((bind_host.as_str(), app_port)).await?;
    info!("Gateway listening on http://{}:{}", bind_host, app_port);

    start_scrcpy_server(LaunchConfig::new(scrcpy_port, scrcpy_host));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn read_port(var: &str, default: u16) -> anyhow::Result<u16> {
    match std::env::var(var) {
        Ok(raw) => Ok(parse_port(&raw).map_err(|e| anyhow::anyhow!("{}: {}", var, e))?),
        Err(_) => Ok(default),
    }
}

/// Launch the external server next to the gateway. A dead or missing
/// server is logged but never takes the gateway down; the embed page shows
/// the connectivity hint instead.
fn start_scrcpy_server(config: LaunchConfig) {
    info!(port = config.port, host = %config.host, "Starting remote-scrcpy server");

    let executable = match resolve_server(None) {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to locate the remote-scrcpy server");
            return;
        }
    };

    tokio::spawn(async move {
        match Supervisor::new(executable, config).run().await {
            Ok(summary) => {
                warn!(code = summary.code, "remote-scrcpy exited");
            }
            Err(err) => {
                error!(error = %err, "Failed to start remote-scrcpy");
            }
        }
    });
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(page::render_index(&state.scrcpy, state.app_port))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Deserialize)]
struct ScrcpyUrlParams {
    udid: Option<String>,
    player: Option<Player>,
}

#[derive(Serialize)]
struct ScrcpyUrlResponse {
    url: String,
    #[serde(rename = "embedUrl")]
    embed_url: String,
}

async fn scrcpy_url(
    State(state): State<AppState>,
    Query(params): Query<ScrcpyUrlParams>,
) -> Json<ScrcpyUrlResponse> {
    Json(ScrcpyUrlResponse {
        url: state.scrcpy.base_url(),
        embed_url: state
            .scrcpy
            .embed_url(params.udid.as_deref(), params.player),
    })
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(err) => {
            warn!(error = %err, "Failed to install SIGTERM handler, watching Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    info!("Shutdown signal received, stopping gateway");
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received, stopping gateway");
}
