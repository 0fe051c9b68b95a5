pub mod auth;
pub mod quota;
pub mod rate_limit;
pub mod security_headers;

pub use auth::{AuthMiddleware, AuthenticatedUser, RequirePermission};
pub use quota::ApiQuota;
pub use rate_limit::{RateLimit, RateLimiter};
pub use security_headers::SecurityHeaders;
