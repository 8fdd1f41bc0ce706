use std::net::SocketAddr;

use tracing::{info, Level};

mod db;
mod domain;
mod error;
mod rest;
mod session;

use domain::{AuthService, GoalService};
use session::SessionStore;

const DEFAULT_PORT: u16 = 10000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Setting up database");
    let db = db::DbConnection::init().await?;

    // Explicit, idempotent migration step, before any request is served
    db.migrate().await?;

    let state = rest::AppState::new(
        AuthService::new(db.clone()),
        GoalService::new(db),
        SessionStore::new(),
    );
    let app = rest::router(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
