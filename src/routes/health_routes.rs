use axum::{Json, Router, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AppState, Envelope};

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/api/health", get(health))
}

pub async fn banner() -> Json<Envelope<()>> {
    Json(Envelope::message(format!(
        "PredCare API v{}",
        env!("CARGO_PKG_VERSION")
    )))
}

/// Liveness only; does not touch the database.
pub async fn health() -> Json<Envelope<HealthData>> {
    Json(
        Envelope::data(HealthData {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
        })
        .with_message("Server is running"),
    )
}
