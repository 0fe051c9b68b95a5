pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod health;
pub mod map;
pub mod report;
pub mod sensors;
pub mod swagger;

use crate::middleware::{ApiQuota, AuthMiddleware, RateLimit, RateLimiter, RequirePermission};
use crate::models::permissions;
use actix_web::{guard, web};
use std::sync::Arc;

/// Registers every route group. `auth_limiter` throttles `/api/auth` on top of the global limiter.
pub fn configure(cfg: &mut web::ServiceConfig, auth_limiter: Arc<RateLimiter>) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/api/docs", web::get().to(swagger::openapi_json))
        // Auth
        .service(
            web::scope("/api/auth")
                .wrap(RateLimit::new(auth_limiter))
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .route("/refresh", web::post().to(auth::refresh_token))
                .route("/plans", web::get().to(auth::plans))
                .service(
                    web::scope("")
                        .wrap(AuthMiddleware)
                        .route("/me", web::get().to(auth::get_me))
                        .route("/profile", web::put().to(auth::update_profile))
                        .route("/preferences", web::put().to(auth::update_preferences))
                        .route("/password", web::put().to(auth::change_password))
                        .route("/subscription", web::put().to(auth::update_subscription))
                        .route("/usage", web::get().to(auth::get_usage))
                        .route("/logout", web::post().to(auth::logout))
                        .route("/account", web::delete().to(auth::delete_account)),
                ),
        )
        // Chat assistant
        .service(
            web::scope("/api/chat")
                .wrap(ApiQuota)
                .wrap(RequirePermission::new(permissions::USE_CHAT))
                .wrap(AuthMiddleware)
                .route("/message", web::post().to(chat::send_message))
                .route("/history", web::get().to(chat::get_history))
                .route("/history", web::delete().to(chat::clear_history)),
        )
        // Sensor marketplace
        .service(
            web::scope("/api/sensors")
                .service(
                    web::resource("/orders")
                        .guard(guard::Post())
                        .wrap(ApiQuota)
                        .wrap(AuthMiddleware)
                        .route(web::post().to(sensors::create_order)),
                )
                .service(
                    web::resource("/orders")
                        .wrap(AuthMiddleware)
                        .route(web::get().to(sensors::list_orders)),
                )
                .service(
                    web::resource("")
                        .guard(guard::Post())
                        .wrap(RequirePermission::new(permissions::MANAGE_SENSORS))
                        .wrap(AuthMiddleware)
                        .route(web::post().to(sensors::create_sensor)),
                )
                .service(web::resource("").route(web::get().to(sensors::list_sensors)))
                .service(web::resource("/{sensor_id}").route(web::get().to(sensors::get_sensor))),
        )
        // Station map
        .service(
            web::scope("/api/map")
                .route("/stations", web::get().to(map::list_stations))
                .route("/heatmap", web::get().to(map::heatmap))
                .service(
                    web::resource("/stations/{station_id}/readings")
                        .wrap(ApiQuota)
                        .wrap(RequirePermission::new(permissions::SUBMIT_READINGS))
                        .wrap(AuthMiddleware)
                        .route(web::post().to(map::submit_reading)),
                )
                .route("/stations/{station_id}", web::get().to(map::get_station)),
        )
        // Dashboard
        .service(
            web::scope("/api/dashboard")
                .wrap(ApiQuota)
                .wrap(AuthMiddleware)
                .route("/overview", web::get().to(dashboard::overview))
                .route("/alerts", web::get().to(dashboard::alerts)),
        )
        // Incident reports
        .service(
            web::scope("/api/report")
                .service(
                    web::resource("")
                        .guard(guard::Post())
                        .wrap(RequirePermission::new(permissions::SUBMIT_REPORTS))
                        .wrap(AuthMiddleware)
                        .route(web::post().to(report::create_report)),
                )
                .service(web::resource("").route(web::get().to(report::list_reports)))
                .service(
                    web::resource("/{report_id}/status")
                        .wrap(RequirePermission::new(permissions::MODERATE_REPORTS))
                        .wrap(AuthMiddleware)
                        .route(web::patch().to(report::update_status)),
                )
                .service(
                    web::resource("/{report_id}/upvote")
                        .wrap(AuthMiddleware)
                        .route(web::post().to(report::upvote)),
                )
                .service(web::resource("/{report_id}").route(web::get().to(report::get_report))),
        );
}
