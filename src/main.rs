// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use lms_quiz::config::Config;
use lms_quiz::repositories::{
    AttemptRepository, MemoryStore, PgAttemptRepository, PgQuestionStore, PgQuizRepository,
    QuestionStore, QuizRepository,
};
use lms_quiz::routes;
use lms_quiz::services::QuizService;
use lms_quiz::state::AppState;
use lms_quiz::utils::clock::SystemClock;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type Stores = (
    Arc<dyn QuizRepository>,
    Arc<dyn QuestionStore>,
    Arc<dyn AttemptRepository>,
);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "app.log");
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

    let (quizzes, questions, attempts): Stores = match &config.database_url {
        Some(url) => {
            let pool = connect_with_retry(url, config.database_max_connections).await?;

            tracing::info!("Running migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Migrations applied successfully.");

            (
                Arc::new(PgQuizRepository::new(pool.clone())),
                Arc::new(PgQuestionStore::new(pool.clone())),
                Arc::new(PgAttemptRepository::new(pool)),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping quiz data in memory");
            let store = MemoryStore::new();
            (
                Arc::new(store.clone()),
                Arc::new(store.clone()),
                Arc::new(store),
            )
        }
    };

    let service = QuizService::new(quizzes, questions, attempts, Arc::new(SystemClock));
    let state = AppState {
        service: Arc::new(service),
        config: config.clone(),
    };

    let app = routes::create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Initializes the database pool, retrying while the database comes up.
async fn connect_with_retry(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
        {
            Ok(pool) => {
                tracing::info!("Database connected...");
                return Ok(pool);
            }
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e);
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
