use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Router の構築
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // 認証
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        // パスワードリセット
        .route(
            "/passwords/reset-request",
            post(handlers::request_password_reset),
        )
        .route("/passwords/reset", post(handlers::reset_password))
        // 認証が必要なルート（Bearer トークン）
        .route(
            "/api/users/me",
            get(handlers::get_me).put(handlers::update_me),
        )
        .route("/api/users/{id}", get(handlers::get_user))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
