// src/main.rs

use assessment_runner::{
    ai::{LlmClient, LlmExecutionService, LlmScoringService},
    config::Config,
    repository::{AttemptRepository, SqliteAttemptRepository},
    routes,
    runner::AssessmentRunner,
    session::{FileSnapshotStore, SessionStore},
    state::AppState,
    utils::clock::SystemClock,
};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use std::{sync::Arc, time::Duration};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await?;
    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let llm = LlmClient::new(config.ai.clone(), http);

    let clock = Arc::new(SystemClock);
    let snapshots = Arc::new(FileSnapshotStore::with_path(&config.session_file));
    tracing::info!("Session snapshots at {}", snapshots.path().display());

    let attempts: Arc<dyn AttemptRepository> = Arc::new(SqliteAttemptRepository::new(pool));
    let runner = Arc::new(AssessmentRunner::new(
        SessionStore::new(snapshots, clock.clone()),
        Arc::new(LlmScoringService::new(llm.clone())),
        Arc::new(LlmExecutionService::new(llm)),
        attempts.clone(),
        clock,
    ));

    if runner.resume() {
        tracing::info!(
            "Resumed unsubmitted assessment, {}s remaining",
            runner.remaining_seconds().unwrap_or_default()
        );
    }

    let state = AppState {
        runner: runner.clone(),
        attempts,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runner.shutdown();
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
