use crate::{
    config::AppConfig,
    database::Repository,
    middleware::AuthenticatedUser,
    services::auth_service::{
        self, AuthResponse, ChangePasswordRequest, LoginRequest, PlanInfo, RefreshTokenRequest,
        RegisterRequest, UpdatePreferencesRequest, UpdateProfileRequest, UpdateSubscriptionRequest,
        UsageInfo, UserDetails,
    },
    utils::error::AppError,
};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid email, password or name"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    repo: web::Data<dyn Repository>,
    config: web::Data<AppConfig>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    let email = request.email.clone();
    log::info!("📝 POST /auth/register - email: {}", email);

    match auth_service::register(repo.get_ref(), &config, request, Utc::now()).await {
        Ok(response) => {
            log::info!("✅ Registration successful: {}", email);
            Ok(HttpResponse::Created().json(response))
        }
        Err(e) => {
            log::warn!("❌ Registration failed: {} - {}", email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account deactivated"),
        (status = 423, description = "Account locked after repeated failures")
    )
)]
pub async fn login(
    repo: web::Data<dyn Repository>,
    config: web::Data<AppConfig>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔐 POST /auth/login - email: {}", request.email);

    match auth_service::login(repo.get_ref(), &config, &request, Utc::now()).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", request.email);
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = AuthResponse),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh_token(
    repo: web::Data<dyn Repository>,
    config: web::Data<AppConfig>,
    request: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔄 POST /auth/refresh");

    let response = auth_service::refresh_token(repo.get_ref(), &config, &request)
        .await
        .inspect_err(|e| log::warn!("❌ Token refresh failed: {}", e))?;
    log::info!("✅ Token refreshed for {}", response.user.id);
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/auth/plans",
    tag = "Auth",
    responses((status = 200, description = "Subscription plans and quotas", body = [PlanInfo]))
)]
pub async fn plans() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "plans": auth_service::plans()
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserDetails),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(auth: AuthenticatedUser) -> HttpResponse {
    log::info!("👤 GET /auth/me - {}", auth.user.user_id);
    HttpResponse::Ok().json(json!({
        "success": true,
        "user": UserDetails::from_user(&auth.user, Utc::now())
    }))
}

#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "Auth",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserDetails),
        (status = 400, description = "Invalid field")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    request: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("✏️  PUT /auth/profile - {}", auth.user.user_id);

    let user = auth_service::update_profile(repo.get_ref(), auth.user, request.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": user
    })))
}

#[utoipa::path(
    put,
    path = "/api/auth/preferences",
    tag = "Auth",
    request_body = UpdatePreferencesRequest,
    responses((status = 200, description = "Preferences updated")),
    security(("bearer_auth" = []))
)]
pub async fn update_preferences(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    request: web::Json<UpdatePreferencesRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("⚙️  PUT /auth/preferences - {}", auth.user.user_id);

    let preferences =
        auth_service::update_preferences(repo.get_ref(), auth.user, request.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "preferences": preferences
    })))
}

#[utoipa::path(
    put,
    path = "/api/auth/password",
    tag = "Auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Current password is incorrect")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    repo: web::Data<dyn Repository>,
    config: web::Data<AppConfig>,
    auth: AuthenticatedUser,
    request: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = auth.user.user_id.clone();
    log::info!("🔑 PUT /auth/password - {}", user_id);

    auth_service::change_password(repo.get_ref(), &config, auth.user, &request, Utc::now())
        .await
        .inspect_err(|e| log::warn!("❌ Password change failed for {}: {}", user_id, e))?;

    log::info!("✅ Password changed for {}", user_id);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password updated"
    })))
}

#[utoipa::path(
    put,
    path = "/api/auth/subscription",
    tag = "Auth",
    request_body = UpdateSubscriptionRequest,
    responses((status = 200, description = "Plan changed")),
    security(("bearer_auth" = []))
)]
pub async fn update_subscription(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    request: web::Json<UpdateSubscriptionRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("💳 PUT /auth/subscription - {} -> {:?}", auth.user.user_id, request.plan);

    let subscription =
        auth_service::update_subscription(repo.get_ref(), auth.user, request.plan, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "subscription": subscription
    })))
}

#[utoipa::path(
    get,
    path = "/api/auth/usage",
    tag = "Auth",
    responses((status = 200, description = "Quota counters and limits", body = UsageInfo)),
    security(("bearer_auth" = []))
)]
pub async fn get_usage(auth: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "usage": UsageInfo::for_user(&auth.user, Utc::now())
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logged out; the client discards its tokens")),
    security(("bearer_auth" = []))
)]
pub async fn logout(auth: AuthenticatedUser) -> HttpResponse {
    log::info!("👋 POST /auth/logout - {}", auth.user.user_id);
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out"
    }))
}

#[utoipa::path(
    delete,
    path = "/api/auth/account",
    tag = "Auth",
    responses((status = 200, description = "Account deleted")),
    security(("bearer_auth" = []))
)]
pub async fn delete_account(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    log::info!("🗑️ DELETE /auth/account - {}", auth.user.user_id);

    let summary = auth_service::delete_account(repo.get_ref(), &auth.user.user_id).await?;
    log::info!("✅ Account deleted: {}", auth.user.user_id);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Account deleted",
        "summary": summary
    })))
}

#[cfg(test)]
mod tests {
    use crate::api::{self, test_support};
    use crate::database::Repository;
    use crate::models::Role;
    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};

    macro_rules! init_app {
        ($state:expr) => {{
            let limiter = $state.auth_limiter.clone();
            test::init_service(
                App::new()
                    .app_data($state.repo.clone())
                    .app_data($state.config.clone())
                    .app_data($state.json.clone())
                    .configure(move |cfg| api::configure(cfg, limiter)),
            )
            .await
        }};
    }

    fn signup(email: &str, password: &str) -> Value {
        json!({ "name": "Dana Park", "email": email, "password": password })
    }

    #[actix_web::test]
    async fn test_signup_status_codes() {
        let state = test_support::state();
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(signup("dana@example.com", "long-enough-pw"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["success"], true);
        assert!(body["token"].as_str().is_some());
        assert_eq!(body["user"]["email"], "dana@example.com");

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(signup("DANA@example.com", "long-enough-pw"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(signup("not-an-email", "long-enough-pw"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(signup("short@example.com", "short"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_malformed_json_is_400() {
        let state = test_support::state();
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_oversized_json_is_413() {
        let mut state = test_support::state();
        state.json = web::JsonConfig::default()
            .limit(64)
            .error_handler(crate::utils::error::json_error_handler);
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": "big@example.com", "password": "x".repeat(256) }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_lockout_after_five_failures() {
        let state = test_support::state();
        test_support::user_with_role(&state, "lock@example.com", Role::User).await;
        let app = init_app!(state);

        let attempt = |password: &str| {
            test::TestRequest::post()
                .uri("/api/auth/login")
                .set_json(json!({ "email": "lock@example.com", "password": password }))
                .to_request()
        };

        for _ in 0..4 {
            let res = test::call_service(&app, attempt("wrong-password")).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        }
        let res = test::call_service(&app, attempt("wrong-password")).await;
        assert_eq!(res.status(), StatusCode::LOCKED);

        // correct password is refused while locked
        let res = test::call_service(&app, attempt("correct-horse-battery")).await;
        assert_eq!(res.status(), StatusCode::LOCKED);
    }

    #[actix_web::test]
    async fn test_me_requires_access_token() {
        let state = test_support::state();
        let (_, token) = test_support::user_with_role(&state, "me@example.com", Role::User).await;
        let app = init_app!(state);

        let req = test::TestRequest::get().uri("/api/auth/me").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(test_support::bearer(&token))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["user"]["email"], "me@example.com");
        assert_eq!(body["user"]["usage"]["plan"], "free");
    }

    #[actix_web::test]
    async fn test_refresh_token_cannot_access_routes() {
        let state = test_support::state();
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(signup("refresh@example.com", "long-enough-pw"))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        let refresh = body["refresh_token"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(test_support::bearer(&refresh))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/auth/refresh")
            .set_json(json!({ "refresh_token": refresh }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_delete_account_anonymizes_reports() {
        let state = test_support::state();
        let (_, token) = test_support::user_with_role(&state, "gone@example.com", Role::User).await;
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/report")
            .insert_header(test_support::bearer(&token))
            .set_json(json!({
                "title": "Sewage smell near dock",
                "description": "Strong sewage odor along the river walk all afternoon",
                "incident_type": "odor",
                "severity": "medium",
                "location": { "lat": 40.7, "lng": -74.0 }
            }))
            .to_request();
        let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
        let report_id = created["report"]["report_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::delete()
            .uri("/api/auth/account")
            .insert_header(test_support::bearer(&token))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["summary"]["reports_anonymized"], 1);

        let report = state.repo.find_report(&report_id).await.unwrap().unwrap();
        assert!(report.reporter_id.is_none());

        // token no longer resolves to a user
        let req = test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(test_support::bearer(&token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }
}
