use crate::utils::error::AppError;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MAX_LOGIN_ATTEMPTS: u32 = 5;
pub const LOCK_DURATION_HOURS: i64 = 2;

pub mod permissions {
    pub const READ_DATA: &str = "read_data";
    pub const SUBMIT_REPORTS: &str = "submit_reports";
    pub const USE_CHAT: &str = "use_chat";
    pub const SUBMIT_READINGS: &str = "submit_readings";
    pub const EXPORT_DATA: &str = "export_data";
    pub const MODERATE_REPORTS: &str = "moderate_reports";
    pub const MANAGE_SENSORS: &str = "manage_sensors";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Researcher,
    Moderator,
    Admin,
}

impl Role {
    pub fn default_permissions(self) -> Vec<String> {
        use permissions::*;

        let mut granted = vec![READ_DATA, SUBMIT_REPORTS, USE_CHAT];
        match self {
            Role::User => {}
            Role::Researcher => granted.extend([SUBMIT_READINGS, EXPORT_DATA]),
            Role::Moderator => granted.push(MODERATE_REPORTS),
            Role::Admin => granted.extend([
                SUBMIT_READINGS,
                EXPORT_DATA,
                MODERATE_REPORTS,
                MANAGE_SENSORS,
            ]),
        }
        granted.into_iter().map(String::from).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Pro,
    Enterprise,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PlanLimits {
    /// `None` means unlimited
    pub daily: Option<u32>,
    pub monthly: Option<u32>,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Basic, Plan::Pro, Plan::Enterprise];

    pub fn limits(self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits { daily: Some(100), monthly: Some(1_000) },
            Plan::Basic => PlanLimits { daily: Some(1_000), monthly: Some(25_000) },
            Plan::Pro => PlanLimits { daily: Some(10_000), monthly: Some(250_000) },
            Plan::Enterprise => PlanLimits { daily: None, monthly: None },
        }
    }

    pub fn monthly_price(self) -> f64 {
        match self {
            Plan::Free => 0.0,
            Plan::Basic => 9.99,
            Plan::Pro => 29.99,
            Plan::Enterprise => 99.99,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub organization: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Preferences {
    pub email_alerts: bool,
    pub push_alerts: bool,
    pub sms_alerts: bool,
    pub units: Units,
    pub theme: Theme,
    pub language: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            email_alerts: true,
            push_alerts: false,
            sms_alerts: false,
            units: Units::Metric,
            theme: Theme::System,
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub plan: Plan,
    pub status: String,
    pub started_at: i64,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ApiUsage {
    pub requests_today: u32,
    pub requests_this_month: u32,
    pub total_requests: u64,
    /// Unix millis of the last counted request, drives the daily/monthly rollover
    pub last_request_at: Option<i64>,
}

impl ApiUsage {
    /// Counters as they stand at `now`, with day/month rollover applied
    pub fn rolled_over(&self, now: DateTime<Utc>) -> ApiUsage {
        let mut usage = self.clone();
        if let Some(last) = self.last_request_at.and_then(|ms| Utc.timestamp_millis_opt(ms).single()) {
            if last.date_naive() != now.date_naive() {
                usage.requests_today = 0;
            }
            if (last.year(), last.month()) != (now.year(), now.month()) {
                usage.requests_this_month = 0;
            }
        }
        usage
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub preferences: Preferences,
    pub subscription: Subscription,
    #[serde(default)]
    pub api_usage: ApiUsage,
    #[serde(default)]
    pub login_attempts: u32,
    pub lock_until: Option<i64>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    pub last_login: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

fn default_is_active() -> bool {
    true
}

impl User {
    pub fn new(user_id: String, email: String, password_hash: String, name: String, now: i64) -> Self {
        Self {
            user_id,
            email,
            password: password_hash,
            name,
            role: Role::User,
            permissions: Role::User.default_permissions(),
            profile: Profile::default(),
            preferences: Preferences::default(),
            subscription: Subscription {
                plan: Plan::Free,
                status: "active".to_string(),
                started_at: now,
                expires_at: None,
            },
            api_usage: ApiUsage::default(),
            login_attempts: 0,
            lock_until: None,
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.map_or(false, |until| until > now.timestamp_millis())
    }

    /// Minutes left on the lock, rounded up
    pub fn lock_minutes_remaining(&self, now: DateTime<Utc>) -> i64 {
        self.lock_until
            .map(|until| ((until - now.timestamp_millis()).max(0) + 59_999) / 60_000)
            .unwrap_or(0)
    }

    pub fn register_failed_login(&mut self, now: DateTime<Utc>) {
        if self.lock_until.is_some() && !self.is_locked(now) {
            self.login_attempts = 0;
            self.lock_until = None;
        }

        self.login_attempts += 1;
        if self.login_attempts >= MAX_LOGIN_ATTEMPTS && self.lock_until.is_none() {
            self.lock_until = Some((now + Duration::hours(LOCK_DURATION_HOURS)).timestamp_millis());
        }
    }

    pub fn reset_login_attempts(&mut self) {
        self.login_attempts = 0;
        self.lock_until = None;
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.role == Role::Admin || self.permissions.iter().any(|p| p == permission)
    }

    /// Counts one API request against the plan, rejecting once a limit is reached
    pub fn consume_quota(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        let plan = self.subscription.plan;
        let limits = plan.limits();
        let mut usage = self.api_usage.rolled_over(now);

        if let Some(daily) = limits.daily {
            if usage.requests_today >= daily {
                return Err(AppError::TooManyRequests {
                    message: format!(
                        "Daily API quota of {} requests exceeded for the {} plan",
                        daily,
                        plan.name()
                    ),
                    retry_after: seconds_until_next_day(now),
                });
            }
        }
        if let Some(monthly) = limits.monthly {
            if usage.requests_this_month >= monthly {
                return Err(AppError::TooManyRequests {
                    message: format!(
                        "Monthly API quota of {} requests exceeded for the {} plan",
                        monthly,
                        plan.name()
                    ),
                    retry_after: seconds_until_next_month(now),
                });
            }
        }

        usage.requests_today += 1;
        usage.requests_this_month += 1;
        usage.total_requests += 1;
        usage.last_request_at = Some(now.timestamp_millis());
        self.api_usage = usage;
        Ok(())
    }
}

fn seconds_until_next_day(now: DateTime<Utc>) -> u64 {
    let next = now.date_naive().succ_opt().and_then(|d| d.and_hms_opt(0, 0, 0));
    next.map(|n| (n.and_utc() - now).num_seconds().max(1) as u64)
        .unwrap_or(86_400)
}

fn seconds_until_next_month(now: DateTime<Utc>) -> u64 {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .map(|n| (n - now).num_seconds().max(1) as u64)
        .unwrap_or(86_400)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(
            "u1".into(),
            "ana@example.com".into(),
            "hash".into(),
            "Ana".into(),
            0,
        )
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_lock_after_five_failures() {
        let mut u = user();
        let now = at(2026, 3, 1, 10);
        for _ in 0..4 {
            u.register_failed_login(now);
            assert!(!u.is_locked(now));
        }
        u.register_failed_login(now);
        assert!(u.is_locked(now));
        assert_eq!(u.lock_minutes_remaining(now), 120);
        assert!(!u.is_locked(now + Duration::hours(2)));
    }

    #[test]
    fn test_expired_lock_restarts_counter() {
        let mut u = user();
        let now = at(2026, 3, 1, 10);
        for _ in 0..5 {
            u.register_failed_login(now);
        }
        let later = now + Duration::hours(3);
        u.register_failed_login(later);
        assert_eq!(u.login_attempts, 1);
        assert!(!u.is_locked(later));
    }

    #[test]
    fn test_admin_has_every_permission() {
        let mut u = user();
        assert!(u.has_permission(permissions::USE_CHAT));
        assert!(!u.has_permission(permissions::MODERATE_REPORTS));
        u.role = Role::Admin;
        u.permissions.clear();
        assert!(u.has_permission(permissions::MODERATE_REPORTS));
    }

    #[test]
    fn test_quota_daily_limit_and_rollover() {
        let mut u = user();
        let day = at(2026, 3, 1, 10);
        for _ in 0..100 {
            u.consume_quota(day).unwrap();
        }
        match u.consume_quota(day) {
            Err(AppError::TooManyRequests { retry_after, .. }) => assert_eq!(retry_after, 14 * 3600),
            other => panic!("expected quota error, got {:?}", other),
        }

        let next_day = at(2026, 3, 2, 0);
        u.consume_quota(next_day).unwrap();
        assert_eq!(u.api_usage.requests_today, 1);
        assert_eq!(u.api_usage.requests_this_month, 101);
    }

    #[test]
    fn test_quota_monthly_limit() {
        let mut u = user();
        u.api_usage = ApiUsage {
            requests_today: 0,
            requests_this_month: 1_000,
            total_requests: 1_000,
            last_request_at: Some(at(2026, 3, 30, 12).timestamp_millis()),
        };
        assert!(u.consume_quota(at(2026, 3, 31, 9)).is_err());
        assert!(u.consume_quota(at(2026, 4, 1, 0)).is_ok());
    }

    #[test]
    fn test_enterprise_is_unlimited() {
        let mut u = user();
        u.subscription.plan = Plan::Enterprise;
        u.api_usage.requests_today = 1_000_000;
        u.api_usage.requests_this_month = 1_000_000;
        u.api_usage.last_request_at = Some(at(2026, 3, 1, 1).timestamp_millis());
        assert!(u.consume_quota(at(2026, 3, 1, 2)).is_ok());
    }
}
