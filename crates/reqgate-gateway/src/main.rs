//! reqgate gateway binary.
//!
//! - Config: optional YAML (`REQGATE_CONFIG`) + environment overlay
//! - Tracing subscriber (JSON lines in prod)
//! - Rate-limit sweeper tied to the server lifetime
//! - Graceful shutdown on Ctrl-C / SIGTERM

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use reqgate_gateway::config::{self, GatewayConfig};
use reqgate_gateway::obs::log::filter_directive;
use reqgate_gateway::{app_state, router, services};

/// Load config under a stderr bootstrap subscriber so overlay warnings are
/// visible before the configured subscriber exists.
fn load_config() -> GatewayConfig {
    let bootstrap = fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::with_default(bootstrap, config::load).expect("config load failed")
}

fn init_tracing(cfg: &GatewayConfig) {
    let level = cfg.gateway.log_level;
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(filter_directive(rust_log.as_deref(), level))
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if cfg.gateway.environment.is_prod() {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() {
    let cfg = load_config();
    init_tracing(&cfg);

    let listen: SocketAddr = cfg.listen_addr().expect("gateway.listen must be a valid SocketAddr");

    let state = app_state::AppState::new(cfg).expect("app state init failed");
    let _sweeper = state.spawn_sweeper();
    let app = router::build_router(state.clone(), services::routes());

    tracing::info!(
        %listen,
        environment = state.environment().as_str(),
        rate_limit_per_min = state.limiter().limit(),
        "reqgate-gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(listen).await.expect("failed to bind");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");
}
