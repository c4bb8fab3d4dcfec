// Library exports for the api binary and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use sqlx::PgPool;

/// Application state shared across all handlers. Config values that matter
/// after startup (the JWT secret) travel as request extensions instead.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
}
