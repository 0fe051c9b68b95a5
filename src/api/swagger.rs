use actix_web::HttpResponse;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AquaWatch API",
        version = "1.0.0",
        description = "Water-safety monitoring back end.\n\n**Authentication:** protected endpoints take a JWT access token as `Authorization: Bearer <token>`.\n\n**Features:**\n- Accounts, plans and API quotas\n- Sensor marketplace and orders\n- Monitoring station map and readings\n- Community incident reports\n- Water-quality chat assistant"
    ),
    paths(
        // Auth
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::refresh_token,
        crate::api::auth::plans,
        crate::api::auth::get_me,
        crate::api::auth::update_profile,
        crate::api::auth::update_preferences,
        crate::api::auth::change_password,
        crate::api::auth::update_subscription,
        crate::api::auth::get_usage,
        crate::api::auth::logout,
        crate::api::auth::delete_account,

        // Chat
        crate::api::chat::send_message,
        crate::api::chat::get_history,
        crate::api::chat::clear_history,

        // Sensors
        crate::api::sensors::list_sensors,
        crate::api::sensors::get_sensor,
        crate::api::sensors::create_sensor,
        crate::api::sensors::create_order,
        crate::api::sensors::list_orders,

        // Map
        crate::api::map::list_stations,
        crate::api::map::get_station,
        crate::api::map::heatmap,
        crate::api::map::submit_reading,

        // Dashboard
        crate::api::dashboard::overview,
        crate::api::dashboard::alerts,

        // Reports
        crate::api::report::create_report,
        crate::api::report::list_reports,
        crate::api::report::get_report,
        crate::api::report::update_status,
        crate::api::report::upvote,

        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::services::auth_service::RegisterRequest,
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::RefreshTokenRequest,
            crate::services::auth_service::AuthResponse,
            crate::services::auth_service::UserInfo,
            crate::services::auth_service::UserDetails,
            crate::services::auth_service::UsageInfo,
            crate::services::auth_service::PlanInfo,
            crate::services::auth_service::UpdateProfileRequest,
            crate::services::auth_service::UpdatePreferencesRequest,
            crate::services::auth_service::ChangePasswordRequest,
            crate::services::auth_service::UpdateSubscriptionRequest,
            crate::services::auth_service::DeleteAccountSummary,

            crate::services::chat_service::SendMessageRequest,
            crate::services::chat_service::SendMessageResponse,
            crate::services::chat_service::AssistantReply,
            crate::services::chat_service::HistoryResponse,

            crate::services::sensor_service::SensorListResponse,
            crate::services::sensor_service::CreateSensorRequest,
            crate::services::sensor_service::CreateOrderRequest,
            crate::services::sensor_service::OrderLineRequest,
            crate::services::sensor_service::OrdersResponse,

            crate::services::map_service::StationsResponse,
            crate::services::map_service::HeatPoint,
            crate::services::map_service::SubmitReadingRequest,
            crate::services::map_service::SubmitReadingResponse,

            crate::services::dashboard_service::DashboardOverview,
            crate::services::dashboard_service::AlertsResponse,

            crate::services::report_service::CreateReportRequest,
            crate::services::report_service::ReportListResponse,
            crate::services::report_service::UpdateStatusRequest,
            crate::services::report_service::UpvoteResponse,

            crate::services::water_quality::Assessment,
            crate::models::ReportView,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, login, tokens, profile, plans and quotas."),
        (name = "Chat", description = "Water-quality assistant. Requires the use_chat permission and consumes quota."),
        (name = "Sensors", description = "Sensor catalog and orders."),
        (name = "Map", description = "Monitoring stations, readings and heatmap."),
        (name = "Dashboard", description = "Aggregated station and report figures. Consumes quota."),
        (name = "Reports", description = "Community incident reports and moderation."),
        (name = "Health", description = "Service health."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT access token from /api/auth/login"))
                        .build(),
                ),
            );
        }
    }
}

/// Serves the OpenAPI document as JSON
pub async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/login",
            "/api/chat/message",
            "/api/sensors",
            "/api/map/heatmap",
            "/api/dashboard/alerts",
            "/api/report/{report_id}/status",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        assert!(doc.components.unwrap().security_schemes.contains_key("bearer_auth"));
    }
}
