use std::sync::Arc;

use tokio::sync::watch;

mod app;
mod auth;
mod cache;
mod comments;
mod config;
mod dreams;
mod error;
mod feed;
mod generator;
mod likes;
mod queue;
mod social;
mod state;
mod users;
mod worker;

use crate::generator::StubGenerator;
use crate::worker::DreamWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "dreamfeed=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;

    // The lifecycle worker runs alongside the request handlers and winds
    // down cooperatively once the server stops accepting traffic.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = DreamWorker::new(
        app_state.clone(),
        Arc::new(StubGenerator),
        shutdown_rx,
    );
    let worker_handle = tokio::spawn(worker.run());

    let app = app::build_app(app_state);
    app::serve(app).await?;

    let _ = shutdown_tx.send(true);
    worker_handle.await?;

    Ok(())
}
