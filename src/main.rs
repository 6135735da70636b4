use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod admin;
mod assistant;
mod auth;
mod authoring;
mod cart;
mod catalog;
mod config;
mod db;
mod enrollment;
mod error;
mod extract;
mod models;
mod progress;
mod reviews;
mod routes;
mod seed;
mod store;
#[cfg(test)]
mod testutil;

use config::{Config, StoreBackend};
use store::{MemoryStore, PgStore, SharedStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&cfg.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: SharedStore = match cfg.backend {
        StoreBackend::Postgres => Arc::new(PgStore::new(db::connect(&cfg).await?)),
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store, data is lost on exit");
            let memory = MemoryStore::new();
            let token = seed::demo_data(&memory).await?;
            tracing::info!(%token, "demo user signed in");
            Arc::new(memory)
        }
    };

    let app = routes::router(routes::AppState { store })
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = cfg.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
