use crate::{
    database::Repository,
    middleware::AuthenticatedUser,
    services::chat_service::{self, HistoryResponse, SendMessageRequest, SendMessageResponse},
    utils::error::AppError,
};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[utoipa::path(
    post,
    path = "/api/chat/message",
    tag = "Chat",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Assistant reply", body = SendMessageResponse),
        (status = 400, description = "Empty or oversized message"),
        (status = 403, description = "Missing use_chat permission"),
        (status = 429, description = "Plan quota exhausted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_message(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    request: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("💬 POST /chat/message - {}", auth.user.user_id);

    let response =
        chat_service::send_message(repo.get_ref(), &auth.user.user_id, request.into_inner(), Utc::now()).await?;
    log::debug!("🤖 Answered on topic '{}'", response.reply.topic);
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/chat/history",
    tag = "Chat",
    params(("limit" = Option<usize>, Query, description = "Messages to return (default 50, max 200)")),
    responses((status = 200, description = "Oldest first", body = HistoryResponse)),
    security(("bearer_auth" = []))
)]
pub async fn get_history(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let response = chat_service::history(repo.get_ref(), &auth.user.user_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    delete,
    path = "/api/chat/history",
    tag = "Chat",
    responses((status = 200, description = "History cleared")),
    security(("bearer_auth" = []))
)]
pub async fn clear_history(
    repo: web::Data<dyn Repository>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let deleted = chat_service::clear_history(repo.get_ref(), &auth.user.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "deleted": deleted
    })))
}
