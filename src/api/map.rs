use crate::{
    database::Repository,
    middleware::AuthenticatedUser,
    models::Station,
    services::map_service::{self, HeatPoint, StationQuery, StationsResponse, SubmitReadingRequest, SubmitReadingResponse},
    utils::error::AppError,
};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/map/stations",
    tag = "Map",
    params(
        ("min_lat" = Option<f64>, Query, description = "Bounding box; all four corners or none"),
        ("max_lat" = Option<f64>, Query, description = "Bounding box"),
        ("min_lng" = Option<f64>, Query, description = "Bounding box"),
        ("max_lng" = Option<f64>, Query, description = "Bounding box"),
        ("status" = Option<String>, Query, description = "safe, caution, unsafe or unknown")
    ),
    responses(
        (status = 200, description = "Stations without reading history", body = StationsResponse),
        (status = 400, description = "Incomplete bounding box or unknown status")
    )
)]
pub async fn list_stations(
    repo: web::Data<dyn Repository>,
    query: web::Query<StationQuery>,
) -> Result<HttpResponse, AppError> {
    log::info!("🗺️  GET /map/stations");
    let response = map_service::list_stations(repo.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/map/stations/{station_id}",
    tag = "Map",
    params(("station_id" = String, Path, description = "Station id")),
    responses(
        (status = 200, description = "Station with reading history", body = Station),
        (status = 404, description = "Station not found")
    )
)]
pub async fn get_station(
    repo: web::Data<dyn Repository>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let station = map_service::get_station(repo.get_ref(), &path).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "station": station
    })))
}

#[utoipa::path(
    get,
    path = "/api/map/heatmap",
    tag = "Map",
    responses((status = 200, description = "Weighted points; safe 0, caution 0.5, unsafe 1", body = [HeatPoint]))
)]
pub async fn heatmap(repo: web::Data<dyn Repository>) -> Result<HttpResponse, AppError> {
    let points = map_service::heatmap(repo.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "points": points
    })))
}

#[utoipa::path(
    post,
    path = "/api/map/stations/{station_id}/readings",
    tag = "Map",
    params(("station_id" = String, Path, description = "Station id")),
    request_body = SubmitReadingRequest,
    responses(
        (status = 201, description = "Reading stored and station re-rated", body = SubmitReadingResponse),
        (status = 400, description = "Empty or out-of-range metrics"),
        (status = 403, description = "Missing submit_readings permission"),
        (status = 404, description = "Station not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn submit_reading(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    path: web::Path<String>,
    request: web::Json<SubmitReadingRequest>,
) -> Result<HttpResponse, AppError> {
    let station_id = path.into_inner();
    log::info!("📈 POST /map/stations/{}/readings - {}", station_id, auth.user.user_id);

    let response = map_service::submit_reading(
        repo.get_ref(),
        &station_id,
        &auth.user.user_id,
        request.into_inner(),
        Utc::now(),
    )
    .await?;
    Ok(HttpResponse::Created().json(response))
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
    async fn test_public_map_routes() {
        let state = test_support::state();
        seeds::seed_stations(state.repo.get_ref()).await;
        let limiter = state.auth_limiter.clone();
        let app = test::init_service(
            App::new()
                .app_data(state.repo.clone())
                .app_data(state.config.clone())
                .configure(move |cfg| api::configure(cfg, limiter)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/map/stations?min_lat=40.5&max_lat=41.0&min_lng=-74.3&max_lng=-73.7")
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        // Croton is north of the box
        assert_eq!(body["count"], 4);

        let req = test::TestRequest::get().uri("/api/map/stations?min_lat=40.5").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/map/heatmap").to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        let weights: Vec<f64> = body["points"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["weight"].as_f64().unwrap())
            .collect();
        assert!(weights.contains(&1.0));
        assert!(weights.contains(&0.5));
    }

    #[actix_web::test]
    async fn test_reading_submission_requires_researcher() {
        let state = test_support::state();
        seeds::seed_stations(state.repo.get_ref()).await;
        let station_id = state.repo.list_stations().await.unwrap()[0].station_id.clone();
        let (_, user_token) = test_support::user_with_role(&state, "citizen@example.com", Role::User).await;
        let (_, researcher_token) =
            test_support::user_with_role(&state, "lab@example.com", Role::Researcher).await;
        let limiter = state.auth_limiter.clone();
        let app = test::init_service(
            App::new()
                .app_data(state.repo.clone())
                .app_data(state.config.clone())
                .configure(move |cfg| api::configure(cfg, limiter)),
        )
        .await;

        let uri = format!("/api/map/stations/{}/readings", station_id);
        let reading = json!({ "metrics": { "ph": 7.1, "turbidity": 0.3 } });

        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header(test_support::bearer(&user_token))
            .set_json(&reading)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri(&uri)
            .insert_header(test_support::bearer(&researcher_token))
            .set_json(&reading)
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["assessment"]["status"], "safe");
    }
}
