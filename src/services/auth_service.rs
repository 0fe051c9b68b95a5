use crate::{
    config::{AppConfig, JwtSettings},
    database::Repository,
    models::{ApiUsage, Plan, Preferences, Profile, Role, Subscription, Theme, Units, User},
    utils::error::AppError,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,           // user_id
    pub email: String,
    pub role: Role,
    pub typ: TokenType,
    pub iat: usize,            // issued at
    pub exp: usize,            // expiration
    pub jti: String,           // JWT ID
    pub aud: String,           // audience
    pub iss: String,           // issuer
}

// Request/Response structures
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub organization: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub plan: Plan,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.user_id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            permissions: user.permissions.clone(),
            plan: user.subscription.plan,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsageInfo {
    pub plan: Plan,
    pub requests_today: u32,
    pub daily_limit: Option<u32>,
    pub daily_remaining: Option<u32>,
    pub requests_this_month: u32,
    pub monthly_limit: Option<u32>,
    pub monthly_remaining: Option<u32>,
    pub total_requests: u64,
}

impl UsageInfo {
    pub fn for_user(user: &User, now: DateTime<Utc>) -> Self {
        let plan = user.subscription.plan;
        let limits = plan.limits();
        let usage: ApiUsage = user.api_usage.rolled_over(now);

        Self {
            plan,
            requests_today: usage.requests_today,
            daily_limit: limits.daily,
            daily_remaining: limits.daily.map(|l| l.saturating_sub(usage.requests_today)),
            requests_this_month: usage.requests_this_month,
            monthly_limit: limits.monthly,
            monthly_remaining: limits.monthly.map(|l| l.saturating_sub(usage.requests_this_month)),
            total_requests: usage.total_requests,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDetails {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub permissions: Vec<String>,
    pub profile: Profile,
    pub preferences: Preferences,
    pub subscription: Subscription,
    pub usage: UsageInfo,
    pub last_login: Option<i64>,
    pub created_at: i64,
}

impl UserDetails {
    pub fn from_user(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            id: user.user_id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            permissions: user.permissions.clone(),
            profile: user.profile.clone(),
            preferences: user.preferences.clone(),
            subscription: user.subscription.clone(),
            usage: UsageInfo::for_user(user, now),
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub organization: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdatePreferencesRequest {
    pub email_alerts: Option<bool>,
    pub push_alerts: Option<bool>,
    pub sms_alerts: Option<bool>,
    pub units: Option<Units>,
    pub theme: Option<Theme>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSubscriptionRequest {
    pub plan: Plan,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlanInfo {
    pub plan: Plan,
    pub monthly_price: f64,
    pub daily_limit: Option<u32>,
    pub monthly_limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteAccountSummary {
    pub reports_anonymized: u64,
    pub orders_deleted: u64,
    pub chat_messages_deleted: u64,
}

// ==================== VALIDATION ====================

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    let length = password.chars().count();
    if length < 8 {
        return Err(AppError::Validation("Password must be at least 8 characters long".to_string()));
    }
    if length > 128 {
        return Err(AppError::Validation("Password must be at most 128 characters long".to_string()));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    let length = name.chars().count();
    if !(2..=100).contains(&length) {
        return Err(AppError::Validation("Name must be between 2 and 100 characters".to_string()));
    }
    Ok(name.to_string())
}

fn optional_field(value: Option<String>, field: &str, max: usize) -> Result<Option<String>, AppError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.chars().count() > max => Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        Some(v) if v.is_empty() => Ok(None),
        other => Ok(other),
    }
}

// ==================== PASSWORDS ====================

pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
        .map_err(AppError::from)
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
        .map_err(AppError::from)
}

// ==================== TOKENS ====================

fn encode_claims(user: &User, typ: TokenType, lifetime: Duration, jwt: &JwtSettings) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.user_id.clone(),
        email: user.email.clone(),
        role: user.role,
        typ,
        iat: now.timestamp() as usize,
        exp: (now + lifetime).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: jwt.audience.clone(),
        iss: jwt.issuer.clone(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(jwt.secret.as_ref()))
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

pub fn generate_jwt(user: &User, jwt: &JwtSettings) -> Result<String, AppError> {
    encode_claims(user, TokenType::Access, Duration::hours(jwt.expires_hours), jwt)
}

pub fn generate_refresh_token(user: &User, jwt: &JwtSettings) -> Result<String, AppError> {
    encode_claims(user, TokenType::Refresh, Duration::days(jwt.refresh_days), jwt)
}

pub fn verify_token(token: &str, jwt: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[jwt.audience.as_str()]);
    validation.set_issuer(&[jwt.issuer.as_str()]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(jwt.secret.as_ref()), &validation)?;
    Ok(data.claims)
}

fn auth_response(user: &User, jwt: &JwtSettings) -> Result<AuthResponse, AppError> {
    Ok(AuthResponse {
        success: true,
        token: generate_jwt(user, jwt)?,
        refresh_token: generate_refresh_token(user, jwt)?,
        expires_in: jwt.expires_hours * 3600,
        user: UserInfo::from(user),
    })
}

// ==================== ACCOUNT FLOWS ====================

pub async fn register(
    repo: &dyn Repository,
    config: &AppConfig,
    request: RegisterRequest,
    now: DateTime<Utc>,
) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&request.email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Please provide a valid email address".to_string()));
    }
    validate_password(&request.password)?;
    let name = validate_name(&request.name)?;

    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let password_hash = hash_password(&request.password, config.bcrypt_cost).await?;
    let mut user = User::new(
        ObjectId::new().to_hex(),
        email,
        password_hash,
        name,
        now.timestamp_millis(),
    );
    user.profile.organization = optional_field(request.organization, "Organization", 200)?;
    user.last_login = Some(now.timestamp_millis());

    repo.insert_user(&user).await?;
    log::info!("✅ User registered successfully: {}", user.email);

    auth_response(&user, &config.jwt)
}

pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    request: &LoginRequest,
    now: DateTime<Utc>,
) -> Result<AuthResponse, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let email = normalize_email(&request.email);
    let mut user = repo.find_user_by_email(&email).await?.ok_or_else(invalid)?;

    if user.is_locked(now) {
        return Err(AppError::Locked(format!(
            "Account temporarily locked due to too many failed login attempts. Try again in {} minutes",
            user.lock_minutes_remaining(now)
        )));
    }

    if !verify_password(&request.password, &user.password).await? {
        user.register_failed_login(now);
        user.updated_at = now.timestamp_millis();
        repo.save_user(&user).await?;

        if user.is_locked(now) {
            log::warn!("🔒 Account locked after {} failed attempts: {}", user.login_attempts, email);
            return Err(AppError::Locked(format!(
                "Too many failed login attempts. Account locked for {} minutes",
                user.lock_minutes_remaining(now)
            )));
        }
        return Err(invalid());
    }

    if !user.is_active {
        return Err(AppError::Forbidden("Account is deactivated".to_string()));
    }

    user.reset_login_attempts();
    user.last_login = Some(now.timestamp_millis());
    user.updated_at = now.timestamp_millis();
    repo.save_user(&user).await?;

    auth_response(&user, &config.jwt)
}

pub async fn refresh_token(
    repo: &dyn Repository,
    config: &AppConfig,
    request: &RefreshTokenRequest,
) -> Result<AuthResponse, AppError> {
    let claims = verify_token(&request.refresh_token, &config.jwt)?;
    if claims.typ != TokenType::Refresh {
        return Err(AppError::Unauthorized("A refresh token is required".to_string()));
    }

    let user = repo
        .find_user_by_id(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    if !user.is_active {
        return Err(AppError::Forbidden("Account is deactivated".to_string()));
    }

    auth_response(&user, &config.jwt)
}

pub async fn update_profile(
    repo: &dyn Repository,
    mut user: User,
    request: UpdateProfileRequest,
    now: DateTime<Utc>,
) -> Result<UserDetails, AppError> {
    if let Some(name) = request.name {
        user.name = validate_name(&name)?;
    }
    if request.organization.is_some() {
        user.profile.organization = optional_field(request.organization, "Organization", 200)?;
    }
    if request.location.is_some() {
        user.profile.location = optional_field(request.location, "Location", 200)?;
    }
    if request.phone.is_some() {
        user.profile.phone = optional_field(request.phone, "Phone", 32)?;
    }
    if request.bio.is_some() {
        user.profile.bio = optional_field(request.bio, "Bio", 1000)?;
    }
    if request.avatar.is_some() {
        user.profile.avatar = optional_field(request.avatar, "Avatar", 500)?;
    }

    user.updated_at = now.timestamp_millis();
    repo.save_user(&user).await?;
    Ok(UserDetails::from_user(&user, now))
}

pub async fn update_preferences(
    repo: &dyn Repository,
    mut user: User,
    request: UpdatePreferencesRequest,
    now: DateTime<Utc>,
) -> Result<Preferences, AppError> {
    let prefs = &mut user.preferences;
    if let Some(v) = request.email_alerts {
        prefs.email_alerts = v;
    }
    if let Some(v) = request.push_alerts {
        prefs.push_alerts = v;
    }
    if let Some(v) = request.sms_alerts {
        prefs.sms_alerts = v;
    }
    if let Some(v) = request.units {
        prefs.units = v;
    }
    if let Some(v) = request.theme {
        prefs.theme = v;
    }
    if let Some(language) = request.language {
        let language = language.trim().to_lowercase();
        if !(2..=10).contains(&language.len()) {
            return Err(AppError::Validation("Language must be a 2-10 character code".to_string()));
        }
        prefs.language = language;
    }

    user.updated_at = now.timestamp_millis();
    repo.save_user(&user).await?;
    Ok(user.preferences)
}

pub async fn change_password(
    repo: &dyn Repository,
    config: &AppConfig,
    mut user: User,
    request: &ChangePasswordRequest,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if !verify_password(&request.current_password, &user.password).await? {
        return Err(AppError::Unauthorized("Current password is incorrect".to_string()));
    }
    validate_password(&request.new_password)?;
    if request.new_password == request.current_password {
        return Err(AppError::Validation(
            "New password must be different from the current password".to_string(),
        ));
    }

    user.password = hash_password(&request.new_password, config.bcrypt_cost).await?;
    user.reset_login_attempts();
    user.updated_at = now.timestamp_millis();
    repo.save_user(&user).await
}

pub async fn update_subscription(
    repo: &dyn Repository,
    mut user: User,
    plan: Plan,
    now: DateTime<Utc>,
) -> Result<Subscription, AppError> {
    if user.subscription.plan != plan {
        user.subscription = Subscription {
            plan,
            status: "active".to_string(),
            started_at: now.timestamp_millis(),
            expires_at: None,
        };
        user.updated_at = now.timestamp_millis();
        repo.save_user(&user).await?;
        log::info!("💳 Subscription changed to {} for user {}", plan.name(), user.user_id);
    }
    Ok(user.subscription)
}

pub fn plans() -> Vec<PlanInfo> {
    Plan::ALL
        .iter()
        .map(|&plan| {
            let limits = plan.limits();
            PlanInfo {
                plan,
                monthly_price: plan.monthly_price(),
                daily_limit: limits.daily,
                monthly_limit: limits.monthly,
            }
        })
        .collect()
}

/// Deletes the user with their orders and chat history; reports stay public but lose the author
pub async fn delete_account(repo: &dyn Repository, user_id: &str) -> Result<DeleteAccountSummary, AppError> {
    log::info!("🗑️ Deleting account for user_id: {}", user_id);

    if !repo.delete_user(user_id).await? {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    let summary = DeleteAccountSummary {
        reports_anonymized: repo.anonymize_reports(user_id).await?,
        orders_deleted: repo.delete_orders_for_user(user_id).await?,
        chat_messages_deleted: repo.clear_chat_history(user_id).await?,
    };

    log::info!("🎉 Account deleted for user {}: {:?}", user_id, summary);
    Ok(summary)
}
