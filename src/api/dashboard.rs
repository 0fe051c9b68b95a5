use crate::{
    database::Repository,
    middleware::AuthenticatedUser,
    services::dashboard_service::{self, AlertsResponse, DashboardOverview},
    utils::error::AppError,
};
use actix_web::{web, HttpResponse};

#[utoipa::path(
    get,
    path = "/api/dashboard/overview",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Station, report and order summary", body = DashboardOverview),
        (status = 401, description = "Missing or invalid token"),
        (status = 429, description = "Plan quota exhausted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn overview(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    log::info!("📊 GET /dashboard/overview - {}", auth.user.user_id);
    let overview = dashboard_service::overview(repo.get_ref(), &auth.user.user_id).await?;
    Ok(HttpResponse::Ok().json(overview))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/alerts",
    tag = "Dashboard",
    responses((status = 200, description = "Flagged stations and open severe reports", body = AlertsResponse)),
    security(("bearer_auth" = []))
)]
pub async fn alerts(repo: web::Data<dyn Repository>) -> Result<HttpResponse, AppError> {
    let alerts = dashboard_service::alerts(repo.get_ref()).await?;
    log::info!("🚨 GET /dashboard/alerts - {} active", alerts.count);
    Ok(HttpResponse::Ok().json(alerts))
}

#[cfg(test)]
mod tests {
    use crate::api::{self, test_support};
    use crate::models::Role;
    use crate::seeds;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_dashboard_requires_auth_and_counts_quota() {
        let state = test_support::state();
        seeds::seed_stations(state.repo.get_ref()).await;
        let (_, token) = test_support::user_with_role(&state, "dash@example.com", Role::User).await;
        let limiter = state.auth_limiter.clone();
        let app = test::init_service(
            App::new()
                .app_data(state.repo.clone())
                .app_data(state.config.clone())
                .configure(move |cfg| api::configure(cfg, limiter)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/dashboard/overview").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/dashboard/overview")
            .insert_header(test_support::bearer(&token))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["stations"]["total"], 5);

        let req = test::TestRequest::get()
            .uri("/api/dashboard/alerts")
            .insert_header(test_support::bearer(&token))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.headers().get("x-quota-daily-remaining").unwrap(), "98");
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["alerts"][0]["severity"], "critical");
    }
}
