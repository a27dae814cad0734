use axum::{extract::State, Json};
use serde::Serialize;
use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub store: String,
    pub telegram: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let telegram_status = if state.telegram.is_some() {
        "enabled".to_string()
    } else {
        "disabled".to_string()
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        store: state.store_backend.to_string(),
        telegram: telegram_status,
    })
}

pub async fn home() -> &'static str {
    "Server is running.\n"
}
