use super::auth::AuthenticatedUser;
use crate::{database::Repository, models::User, utils::error::AppError};
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    web, Error, HttpMessage,
};
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

const DAILY_LIMIT_HEADER: &str = "x-quota-daily-limit";
const DAILY_REMAINING_HEADER: &str = "x-quota-daily-remaining";
const CHARGE_ATTEMPTS: usize = 3;

/// Charges one request against the caller's plan quota.
/// Must be wrapped inside `AuthMiddleware`.
pub struct ApiQuota;

impl<S, B> Transform<S, ServiceRequest> for ApiQuota
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiQuotaService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiQuotaService { service: Rc::new(service) }))
    }
}

pub struct ApiQuotaService<S> {
    service: Rc<S>,
}

/// Returns the daily (limit, remaining) pair after charging, None for unlimited plans
async fn charge(req: &ServiceRequest) -> Result<Option<(u32, u32)>, AppError> {
    let mut auth = req
        .extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Access token required".to_string()))?;
    let repo = req
        .app_data::<web::Data<dyn Repository>>()
        .cloned()
        .ok_or_else(|| AppError::Internal("Repository not registered".to_string()))?;

    charge_user(repo.get_ref(), &mut auth.user, Utc::now()).await?;

    let daily = auth
        .user
        .subscription
        .plan
        .limits()
        .daily
        .map(|limit| (limit, limit.saturating_sub(auth.user.api_usage.requests_today)));

    req.extensions_mut().insert(auth);
    Ok(daily)
}

/// Counts one request for `user`, retrying from fresh state when a concurrent
/// request updated the counters first. On success `user.api_usage` is what was stored.
async fn charge_user(repo: &dyn Repository, user: &mut User, now: DateTime<Utc>) -> Result<(), AppError> {
    for _ in 0..CHARGE_ATTEMPTS {
        let seen_total = user.api_usage.total_requests;
        let mut charged = user.clone();
        charged.consume_quota(now)?;
        if repo.save_api_usage(&user.user_id, seen_total, &charged.api_usage).await? {
            user.api_usage = charged.api_usage;
            return Ok(());
        }

        *user = repo
            .find_user_by_id(&user.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
    }
    Err(AppError::Conflict("Too many concurrent requests, please retry".to_string()))
}

impl<S, B> Service<ServiceRequest> for ApiQuotaService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let daily = match charge(&req).await {
                Ok(daily) => daily,
                Err(e) => {
                    log::warn!("📉 Quota check failed for {}: {}", req.path(), e);
                    return Ok(req.error_response(e).map_into_right_body());
                }
            };

            let mut res = service.call(req).await?;
            if let Some((limit, remaining)) = daily {
                let headers = res.headers_mut();
                headers.insert(HeaderName::from_static(DAILY_LIMIT_HEADER), HeaderValue::from(limit));
                headers.insert(HeaderName::from_static(DAILY_REMAINING_HEADER), HeaderValue::from(remaining));
            }
            Ok(res.map_into_left_body())
        })
    }
}
