use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rydz_api::{config::Config, db, middleware::auth::JwtSecret, routes, services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    services::metrics::start(pool.clone());

    let state = AppState { db: pool };

    // CORS: the app base URL plus localhost for development.
    let base_url = config.app_base_url.clone();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let o = match origin.to_str() {
            Ok(s) => s,
            Err(_) => return false,
        };
        if o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") {
            return true;
        }
        o == base_url
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Users
        .route("/users/me", get(routes::users::me).put(routes::users::update_me))
        .route("/users/me/students", get(routes::users::list_my_students).post(routes::users::link_student))
        .route("/users/me/students/{id}", delete(routes::users::unlink_student))
        .route("/users/me/parents", get(routes::users::list_my_parents))
        .route("/users/{id}", get(routes::users::get_user))
        // Events
        .route("/events", get(routes::events::list_events).post(routes::events::create_event))
        .route("/events/{id}", get(routes::events::get_event).put(routes::events::update_event))
        .route("/events/{id}/rydz", get(routes::events::list_event_rydz))
        // Rydz
        .route("/rydz", get(routes::rydz::list_rydz).post(routes::rydz::create_ryd))
        .route("/rydz/{id}", get(routes::rydz::get_ryd))
        .route("/rydz/{id}/join", post(routes::rydz::join_ryd).delete(routes::rydz::cancel_join))
        .route("/rydz/{id}/status", post(routes::rydz::update_ryd_status))
        .route("/rydz/{id}/passengers/{user_id}/respond", post(routes::rydz::driver_respond))
        .route("/rydz/{id}/passengers/{user_id}/on-board", post(routes::rydz::mark_on_board))
        .route("/rydz/{id}/passengers/{user_id}/complete", post(routes::rydz::mark_completed))
        // Parental approvals
        .route("/approvals", get(routes::approvals::list_approvals))
        .route("/approvals/decide", post(routes::approvals::decide))
        .route("/approvals/drivers", get(routes::approvals::get_driver_lists).post(routes::approvals::approve_driver))
        .route("/approvals/drivers/{driver_id}", delete(routes::approvals::remove_driver))
        // Notifications
        .route("/notifications", get(routes::notifications::list_notifications))
        .route("/notifications/{id}/read", post(routes::notifications::mark_read))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("rydz API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
