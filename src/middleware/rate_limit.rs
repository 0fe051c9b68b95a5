use crate::utils::error::AppError;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    Error,
};
use futures::future::LocalBoxFuture;
use std::collections::{HashMap, VecDeque};
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the oldest counted request leaves the window
    pub reset_after: Duration,
}

/// Sliding-window request counter keyed by client address
pub struct RateLimiter {
    name: &'static str,
    max_requests: u32,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, max_requests: u32, window: Duration) -> Self {
        Self {
            name,
            max_requests,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut hits = self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = hits.entry(key.to_string()).or_default();

        while let Some(&oldest) = entry.front() {
            if now.duration_since(oldest) >= self.window {
                entry.pop_front();
            } else {
                break;
            }
        }

        let allowed = (entry.len() as u32) < self.max_requests;
        if allowed {
            entry.push_back(now);
        }

        let reset_after = entry
            .front()
            .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
            .unwrap_or(self.window);

        RateDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.len() as u32),
            reset_after,
        }
    }

    /// Drops keys whose requests have all left the window; returns how many were dropped
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    pub fn prune_at(&self, now: Instant) -> usize {
        let mut hits = self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = hits.len();
        hits.retain(|_, entry| {
            entry
                .back()
                .map_or(false, |&newest| now.duration_since(newest) < self.window)
        });
        before - hits.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.lock().map(|hits| hits.len()).unwrap_or(0)
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(decision.limit));
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(ceil_secs(decision.reset_after)),
    );
}

pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service: Rc::new(service),
            limiter: Arc::clone(&self.limiter),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
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
        let key = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let decision = self.limiter.check(&key);

        if !decision.allowed {
            log::warn!("🚦 [{}] Rate limit exceeded for {} on {}", self.limiter.name(), key, req.path());
            let e = AppError::TooManyRequests {
                message: "Too many requests, please try again later".to_string(),
                retry_after: ceil_secs(decision.reset_after),
            };
            let mut res = req.error_response(e);
            apply_headers(res.headers_mut(), &decision);
            return Box::pin(async move { Ok(res.map_into_right_body()) });
        }

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let mut res = service.call(req).await?;
            apply_headers(res.headers_mut(), &decision);
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App, HttpResponse};

    #[::core::prelude::v1::test]
    fn test_window_slides() {
        let limiter = RateLimiter::new("test", 2, Duration::from_secs(10));
        let start = Instant::now();

        assert!(limiter.check_at("1.2.3.4", start).allowed);
        let second = limiter.check_at("1.2.3.4", start + Duration::from_secs(4));
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let blocked = limiter.check_at("1.2.3.4", start + Duration::from_secs(5));
        assert!(!blocked.allowed);
        assert_eq!(blocked.reset_after, Duration::from_secs(5));

        // other clients are counted separately
        assert!(limiter.check_at("5.6.7.8", start + Duration::from_secs(5)).allowed);

        // first hit has left the window
        assert!(limiter.check_at("1.2.3.4", start + Duration::from_secs(10)).allowed);
    }

    #[::core::prelude::v1::test]
    fn test_prune_drops_idle_keys() {
        let limiter = RateLimiter::new("test", 5, Duration::from_secs(60));
        let start = Instant::now();
        limiter.check_at("a", start);
        limiter.check_at("b", start + Duration::from_secs(30));

        assert_eq!(limiter.prune_at(start + Duration::from_secs(61)), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[actix_web::test]
    async fn test_headers_and_429() {
        let limiter = Arc::new(RateLimiter::new("test", 2, Duration::from_secs(60)));
        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(limiter))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get("x-ratelimit-limit").unwrap(), "2");
        assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), "1");

        test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key("retry-after"));
        assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), "0");
    }
}
