mod ai;
mod alerts;
mod api;
mod auth;
mod config;
mod database;
mod error;
mod models;
mod risk;
mod services;

use axum::http::{HeaderValue, Method};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::Arc;

use crate::{config::AppConfig, database::Database, services::AppServices};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: Arc<Database>,
    pub services: Arc<AppServices>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "innovest_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(AppConfig::new()?);
    let database = Arc::new(Database::new(&config.database).await?);
    let services = Arc::new(AppServices::new(&config)?);

    let app_state = AppState {
        config: config.clone(),
        database,
        services,
    };

    let origin: HeaderValue = config.server.frontend_url.parse()?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    let app = api::router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let port = config.server.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    tracing::info!("InnoVest backend listening on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
