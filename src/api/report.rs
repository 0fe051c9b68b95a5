use crate::{
    database::Repository,
    middleware::AuthenticatedUser,
    models::ReportView,
    services::report_service::{
        self, CreateReportRequest, ReportListResponse, ReportQuery, UpdateStatusRequest, UpvoteResponse,
    },
    utils::error::AppError,
};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

#[utoipa::path(
    post,
    path = "/api/report",
    tag = "Reports",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report filed", body = ReportView),
        (status = 400, description = "Invalid title, description or location"),
        (status = 403, description = "Missing submit_reports permission")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_report(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    request: web::Json<CreateReportRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🚨 POST /report - {}", auth.user.user_id);

    match report_service::create_report(repo.get_ref(), &auth.user, request.into_inner(), Utc::now()).await {
        Ok(report) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "report": report
        }))),
        Err(e) => {
            log::warn!("❌ Report rejected for {}: {}", auth.user.user_id, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/report",
    tag = "Reports",
    params(
        ("status" = Option<String>, Query, description = "pending, investigating, resolved or dismissed"),
        ("incident_type" = Option<String>, Query, description = "Incident type"),
        ("severity" = Option<String>, Query, description = "low, medium, high or critical"),
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 20, max 100)")
    ),
    responses((status = 200, description = "Newest first", body = ReportListResponse))
)]
pub async fn list_reports(
    repo: web::Data<dyn Repository>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AppError> {
    log::info!("📋 GET /report");
    let response = report_service::list_reports(repo.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/report/{report_id}",
    tag = "Reports",
    params(("report_id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report", body = ReportView),
        (status = 404, description = "Report not found")
    )
)]
pub async fn get_report(
    repo: web::Data<dyn Repository>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let report = report_service::get_report(repo.get_ref(), &path).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "report": ReportView::from(report)
    })))
}

#[utoipa::path(
    patch,
    path = "/api/report/{report_id}/status",
    tag = "Reports",
    params(("report_id" = String, Path, description = "Report id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ReportView),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Missing moderate_reports permission")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_status(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    path: web::Path<String>,
    request: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let report_id = path.into_inner();
    log::info!("📝 PATCH /report/{}/status -> {:?}", report_id, request.status);

    let report = report_service::update_status(
        repo.get_ref(),
        &report_id,
        &auth.user.user_id,
        request.into_inner(),
        Utc::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "report": report
    })))
}

#[utoipa::path(
    post,
    path = "/api/report/{report_id}/upvote",
    tag = "Reports",
    params(("report_id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Upvote recorded once per user", body = UpvoteResponse),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upvote(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let response = report_service::upvote(repo.get_ref(), &path, &auth.user.user_id, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use crate::api::{self, test_support};
    use crate::models::Role;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_report_lifecycle() {
        let state = test_support::state();
        let (_, citizen) = test_support::user_with_role(&state, "citizen@example.com", Role::User).await;
        let (_, moderator) = test_support::user_with_role(&state, "mod@example.com", Role::Moderator).await;
        let limiter = state.auth_limiter.clone();
        let app = test::init_service(
            App::new()
                .app_data(state.repo.clone())
                .app_data(state.config.clone())
                .configure(move |cfg| api::configure(cfg, limiter)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/report")
            .insert_header(test_support::bearer(&citizen))
            .set_json(json!({
                "title": "Green scum on lake",
                "description": "Thick algae bloom covering the north shore swimming area",
                "incident_type": "contamination",
                "severity": "high",
                "location": { "lat": 42.1, "lng": -75.9, "address": "North beach" },
                "allow_contact": true
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        let report_id = body["report"]["report_id"].as_str().unwrap().to_string();

        // public listing
        let req = test::TestRequest::get().uri("/api/report?severity=high").to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["total"], 1);

        let status_uri = format!("/api/report/{}/status", report_id);
        let req = test::TestRequest::patch()
            .uri(&status_uri)
            .insert_header(test_support::bearer(&citizen))
            .set_json(json!({ "status": "investigating" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::patch()
            .uri(&status_uri)
            .insert_header(test_support::bearer(&moderator))
            .set_json(json!({ "status": "resolved" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::patch()
            .uri(&status_uri)
            .insert_header(test_support::bearer(&moderator))
            .set_json(json!({ "status": "investigating", "note": "Sampling crew dispatched" }))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["report"]["status"], "investigating");

        let upvote_uri = format!("/api/report/{}/upvote", report_id);
        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri(&upvote_uri)
                .insert_header(test_support::bearer(&citizen))
                .to_request();
            test::call_service(&app, req).await;
        }
        let req = test::TestRequest::get().uri(&format!("/api/report/{}", report_id)).to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["report"]["upvote_count"], 1);
        assert!(body["report"].get("upvotes").is_none());
    }

    #[actix_web::test]
    async fn test_invalid_report_is_400() {
        let state = test_support::state();
        let (_, token) = test_support::user_with_role(&state, "bad@example.com", Role::User).await;
        let limiter = state.auth_limiter.clone();
        let app = test::init_service(
            App::new()
                .app_data(state.repo.clone())
                .app_data(state.config.clone())
                .app_data(state.json.clone())
                .configure(move |cfg| api::configure(cfg, limiter)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/report")
            .insert_header(test_support::bearer(&token))
            .set_json(json!({
                "title": "Bad",
                "description": "too short",
                "incident_type": "odor",
                "severity": "low",
                "location": { "lat": 0.0, "lng": 0.0 }
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/report")
            .insert_header(test_support::bearer(&token))
            .set_json(json!({ "title": "Missing everything else" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_out_of_range_page_is_400() {
        let state = test_support::state();
        let limiter = state.auth_limiter.clone();
        let app = test::init_service(
            App::new()
                .app_data(state.repo.clone())
                .app_data(state.config.clone())
                .configure(move |cfg| api::configure(cfg, limiter)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/report?page={}", u64::MAX))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);

        // far past the end but representable
        let req = test::TestRequest::get().uri("/api/report?page=1000").to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["reports"].as_array().unwrap().len(), 0);
    }
}
