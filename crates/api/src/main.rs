use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use studyplan_core::study_plan::StudyPlan;
use studyplan_db::bootstrap::{self, DbHealth};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studyplan_api::config::ServerConfig;
use studyplan_api::router::build_app_router;
use studyplan_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "studyplan_api=debug,studyplan_db=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Study plan ---
    let plan = match &config.study_plan_path {
        Some(path) => StudyPlan::from_json_file(path)
            .unwrap_or_else(|e| panic!("Failed to load study plan {}: {e}", path.display())),
        None => StudyPlan::default_plan(),
    };
    tracing::info!(subjects = plan.subjects.len(), weeks = plan.weeks.len(), "Study plan loaded");

    // --- Database ---
    // The pool connects lazily; the bootstrap task below brings the database
    // up while the listener is already accepting requests.
    let pool = studyplan_db::create_lazy_pool(&config.database_url)
        .expect("Invalid DATABASE_URL");

    let db_health = DbHealth::new();
    let bootstrap_cancel = CancellationToken::new();
    let bootstrap_handle = {
        let pool = pool.clone();
        let catalog = plan.catalog();
        let bootstrap_config = config.bootstrap_config();
        let health = db_health.clone();
        let cancel = bootstrap_cancel.clone();
        tokio::spawn(async move {
            match bootstrap::initialize(&pool, &catalog, &bootstrap_config, &health, &cancel).await
            {
                Ok(summary) => tracing::info!(
                    scanned = summary.scanned,
                    migrated = summary.migrated,
                    "Database bootstrap complete",
                ),
                Err(e) => tracing::error!(error = %e, "Database bootstrap failed"),
            }
        })
    };

    // --- App state ---
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        db_health,
        plan: Arc::new(plan),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    bootstrap_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), bootstrap_handle).await;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM (on Unix) to start graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
