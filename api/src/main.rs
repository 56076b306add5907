mod error;
mod handlers;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{middleware, Router};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use engine::{Aggregator, Lifecycle};
use store::{ConfigStore, EntityStore, PgConfigStore, PgEntityStore, PgTimelineStore, TimelineStore};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to the database")?;

    tracing::info!("database connected; schema is assumed pre-provisioned");

    let config: Arc<dyn ConfigStore> = Arc::new(PgConfigStore::new(pool.clone()));
    let entities: Arc<dyn EntityStore> = Arc::new(PgEntityStore::new(pool.clone()));
    let timelines: Arc<dyn TimelineStore> = Arc::new(PgTimelineStore::new(pool.clone()));

    let lifecycle = Lifecycle::new(config.clone(), entities.clone(), timelines.clone());
    let aggregator = Aggregator::new(config, entities, timelines);

    let state = AppState::new(lifecycle, aggregator);

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let middleware_stack = ServiceBuilder::new()
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let app = Router::new()
        .merge(routes::timeline_router())
        .fallback(handlers::route_not_found)
        .layer(middleware_stack)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3001));
    tracing::info!("resource timeline API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

async fn request_logger(req: axum::http::Request<axum::body::Body>, next: middleware::Next) -> axum::response::Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed().as_millis();
    let status = response.status().as_u16();
    tracing::info!("{method} {uri} {status} {elapsed}ms");

    response
}
