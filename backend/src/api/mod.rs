pub mod extract;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

/// Every endpoint, mounted under `/api`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health_check))
        // Accounts
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/me", get(handlers::me))
        .route("/dashboard", get(handlers::dashboard))
        // AI
        .route("/chat", post(handlers::chat))
        .route("/predict", post(handlers::predict))
        .route("/alerts/evaluate-email", post(handlers::evaluate_alert_email))
        // History
        .route(
            "/predictions",
            get(handlers::list_predictions).delete(handlers::clear_predictions),
        )
        .route("/predictions/export", get(handlers::export_predictions));

    Router::new().nest("/api", api).with_state(state)
}
