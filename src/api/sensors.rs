use crate::{
    database::Repository,
    middleware::AuthenticatedUser,
    models::{Sensor, SensorOrder},
    services::sensor_service::{
        self, CreateOrderRequest, CreateSensorRequest, OrdersResponse, SensorListResponse, SensorQuery,
    },
    utils::error::AppError,
};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/sensors",
    tag = "Sensors",
    params(
        ("category" = Option<String>, Query, description = "ph, tds, turbidity, chlorine, temperature, conductivity, multi_parameter"),
        ("min_price" = Option<f64>, Query, description = "Minimum price"),
        ("max_price" = Option<f64>, Query, description = "Maximum price"),
        ("search" = Option<String>, Query, description = "Case-insensitive match on name or description"),
        ("in_stock" = Option<bool>, Query, description = "Only listings with stock"),
        ("sort" = Option<String>, Query, description = "price_asc, price_desc, rating or name"),
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default 12, max 100)")
    ),
    responses(
        (status = 200, description = "Sensor catalog page", body = SensorListResponse),
        (status = 400, description = "Invalid filter")
    )
)]
pub async fn list_sensors(
    repo: web::Data<dyn Repository>,
    query: web::Query<SensorQuery>,
) -> Result<HttpResponse, AppError> {
    log::info!("🛒 GET /sensors");

    let response = sensor_service::list_sensors(repo.get_ref(), &query).await?;
    log::info!("✅ Returning {} of {} sensors", response.sensors.len(), response.total);
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/sensors/{sensor_id}",
    tag = "Sensors",
    params(("sensor_id" = String, Path, description = "Sensor id")),
    responses(
        (status = 200, description = "Sensor listing", body = Sensor),
        (status = 404, description = "Sensor not found")
    )
)]
pub async fn get_sensor(
    repo: web::Data<dyn Repository>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let sensor = sensor_service::get_sensor(repo.get_ref(), &path).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "sensor": sensor
    })))
}

#[utoipa::path(
    post,
    path = "/api/sensors",
    tag = "Sensors",
    request_body = CreateSensorRequest,
    responses(
        (status = 201, description = "Listing created", body = Sensor),
        (status = 403, description = "Missing manage_sensors permission")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_sensor(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    request: web::Json<CreateSensorRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("➕ POST /sensors - {} by {}", request.name, auth.user.user_id);

    let sensor = sensor_service::create_sensor(repo.get_ref(), request.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "sensor": sensor
    })))
}

#[utoipa::path(
    post,
    path = "/api/sensors/orders",
    tag = "Sensors",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = SensorOrder),
        (status = 400, description = "Invalid items"),
        (status = 404, description = "Unknown sensor"),
        (status = 409, description = "Insufficient stock")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_order(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    request: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = auth.user.user_id;
    log::info!("📦 POST /sensors/orders - {} ({} lines)", user_id, request.items.len());

    match sensor_service::create_order(repo.get_ref(), &user_id, request.into_inner(), Utc::now()).await {
        Ok(order) => {
            log::info!("✅ Order {} placed: total {:.2}", order.order_id, order.total);
            Ok(HttpResponse::Created().json(json!({
                "success": true,
                "order": order
            })))
        }
        Err(e) => {
            log::warn!("❌ Order failed for {}: {}", user_id, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/sensors/orders",
    tag = "Sensors",
    responses((status = 200, description = "Caller's orders, newest first", body = OrdersResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_orders(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let response = sensor_service::list_orders(repo.get_ref(), &auth.user.user_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use crate::api::{self, test_support};
    use crate::database::Repository;
    use crate::models::Role;
    use crate::seeds;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_public_catalog_and_protected_writes() {
        let state = test_support::state();
        seeds::seed_sensor_catalog(state.repo.get_ref()).await;
        let (_, user_token) = test_support::user_with_role(&state, "buyer@example.com", Role::User).await;
        let (_, admin_token) = test_support::user_with_role(&state, "admin@example.com", Role::Admin).await;
        let limiter = state.auth_limiter.clone();
        let app = test::init_service(
            App::new()
                .app_data(state.repo.clone())
                .app_data(state.config.clone())
                .configure(move |cfg| api::configure(cfg, limiter)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/sensors?sort=price_desc&limit=3").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["sensors"].as_array().unwrap().len(), 3);

        let req = test::TestRequest::get()
            .uri(&format!("/api/sensors?page={}", u64::MAX))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/sensors/does-not-exist").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let listing = json!({
            "name": "Nitrate Test Strips",
            "description": "Pack of 50 nitrate and nitrite strips",
            "category": "multi_parameter",
            "manufacturer": "StripLab",
            "price": 12.5,
            "stock": 200
        });
        let req = test::TestRequest::post().uri("/api/sensors").set_json(&listing).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/sensors")
            .insert_header(test_support::bearer(&user_token))
            .set_json(&listing)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/api/sensors")
            .insert_header(test_support::bearer(&admin_token))
            .set_json(&listing)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    #[actix_web::test]
    async fn test_order_flow() {
        let state = test_support::state();
        seeds::seed_sensor_catalog(state.repo.get_ref()).await;
        let (_, token) = test_support::user_with_role(&state, "orders@example.com", Role::User).await;
        let sensor = state.repo.list_sensors().await.unwrap().into_iter().find(|s| s.stock > 0).unwrap();
        let limiter = state.auth_limiter.clone();
        let app = test::init_service(
            App::new()
                .app_data(state.repo.clone())
                .app_data(state.config.clone())
                .configure(move |cfg| api::configure(cfg, limiter)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/sensors/orders")
            .insert_header(test_support::bearer(&token))
            .set_json(json!({ "items": [{ "sensor_id": sensor.sensor_id, "quantity": 1 }] }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["order"]["status"], "pending");

        let req = test::TestRequest::post()
            .uri("/api/sensors/orders")
            .insert_header(test_support::bearer(&token))
            .set_json(json!({ "items": [{ "sensor_id": sensor.sensor_id, "quantity": 100 }] }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::get()
            .uri("/api/sensors/orders")
            .insert_header(test_support::bearer(&token))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["count"], 1);
    }
}
