use crate::{config::AppConfig, database::Repository};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub environment: String,
    /// connected, disconnected or memory
    pub database: String,
    pub timestamp: i64,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_check(repo: web::Data<dyn Repository>, config: web::Data<AppConfig>) -> HttpResponse {
    let database = match repo.backend() {
        "memory" => "memory",
        _ => match repo.ping().await {
            Ok(()) => "connected",
            Err(e) => {
                log::warn!("⚠️  Health check: database ping failed: {}", e);
                "disconnected"
            }
        },
    };

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: config.environment.clone(),
        database: database.to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}
