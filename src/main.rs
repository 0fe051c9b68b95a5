mod api;
mod config;
mod database;
mod jobs;
mod middleware;
mod models;
mod seeds;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use config::AppConfig;
use database::{MemoryStore, MongoDB, Repository};
use dotenv::dotenv;
use middleware::{RateLimit, RateLimiter, SecurityHeaders};
use std::sync::Arc;
use std::time::Duration;
use utils::error::{json_error_handler, query_error_handler};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ Invalid configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
        }
    };
    utils::error::hide_internal_details(config.is_production());

    log::info!("🚀 Starting AquaWatch service ({})...", config.environment);

    let repo: Arc<dyn Repository> = match &config.mongodb_uri {
        Some(uri) => match MongoDB::new(uri).await {
            Ok(db) => {
                log::info!("✅ MongoDB connected successfully");
                Arc::new(db)
            }
            Err(e) => {
                log::error!("❌ Failed to connect to MongoDB: {}", e);
                return Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string()));
            }
        },
        None => {
            log::warn!("⚠️  MONGODB_URI not set, using in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    // 🌱 Seed catalog and stations
    seeds::seed_all(repo.as_ref()).await;

    let window = Duration::from_secs(config.rate_limit.window_secs);
    let global_limiter = Arc::new(RateLimiter::new("global", config.rate_limit.max_requests, window));
    let auth_limiter = Arc::new(RateLimiter::new("auth", config.rate_limit.auth_max_requests, window));

    log::info!("📅 Starting background jobs...");
    jobs::rate_limit_cleanup::start_rate_limit_cleanup(
        vec![Arc::clone(&global_limiter), Arc::clone(&auth_limiter)],
        Duration::from_secs(60),
    );

    let bind = (config.host.clone(), config.port);
    log::info!("🌐 Server starting on {}:{}", bind.0, bind.1);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", bind.0, bind.1);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api/docs", bind.0, bind.1);

    let repo_data: web::Data<dyn Repository> = web::Data::from(repo);
    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config_data.frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers(vec![
                header::RETRY_AFTER,
                header::HeaderName::from_static("x-ratelimit-limit"),
                header::HeaderName::from_static("x-ratelimit-remaining"),
                header::HeaderName::from_static("x-ratelimit-reset"),
            ])
            .supports_credentials()
            .max_age(3600);

        let json_config = web::JsonConfig::default()
            .limit(config_data.json_limit)
            .error_handler(json_error_handler);
        let query_config = web::QueryConfig::default().error_handler(query_error_handler);
        let auth_limiter = Arc::clone(&auth_limiter);

        App::new()
            .app_data(repo_data.clone())
            .app_data(config_data.clone())
            .app_data(json_config)
            .app_data(query_config)
            .wrap(RateLimit::new(Arc::clone(&global_limiter)))
            .wrap(SecurityHeaders)
            .wrap(cors)
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api/docs/openapi.json", api::swagger::ApiDoc::openapi()))
            .configure(|cfg| api::configure(cfg, auth_limiter))
    })
    .bind(bind)?
    .run()
    .await
}
