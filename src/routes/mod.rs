use crate::models::AppState;
use axum::{Json, Router, http::{StatusCode, Uri}, response::IntoResponse};

pub mod auth_routes;
pub mod availability_routes;
pub mod doctor_routes;
pub mod health_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes::router())
        .nest("/api/doctors", doctor_routes::router())
        .nest("/api/availability", availability_routes::router())
        .merge(health_routes::router())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "message": "Route not found",
            "path": uri.path(),
        })),
    )
}
