use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    // Mobile clients send no Origin and the web client runs on a dev port,
    // so every origin is accepted.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let api = Router::new()
        .route("/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route("/tasks/weekly", get(handlers::weekly_tasks))
        .route(
            "/tasks/:id",
            patch(handlers::update_task).delete(handlers::delete_task),
        )
        .route("/journal", get(handlers::list_journal).post(handlers::save_journal))
        .route("/journal/:date_key", get(handlers::get_journal))
        .route("/settings", get(handlers::get_settings).put(handlers::put_settings))
        .route("/analytics", get(handlers::get_analytics))
        .route("/chat", post(handlers::chat));

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
