use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expires_hours: i64,
    pub refresh_days: i64,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_requests: u32,
    pub auth_max_requests: u32,
}

/// Runtime configuration, read once at start-up
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mongodb_uri: Option<String>,
    pub jwt: JwtSettings,
    pub frontend_url: String,
    pub environment: String,
    pub bcrypt_cost: u32,
    pub rate_limit: RateLimitSettings,
    pub json_limit: usize,
}

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            mongodb_uri: None,
            jwt: JwtSettings {
                secret: DEV_JWT_SECRET.to_string(),
                issuer: "aquawatch-service".to_string(),
                audience: "aquawatch-api".to_string(),
                expires_hours: 24,
                refresh_days: 30,
            },
            frontend_url: "http://localhost:3000".to_string(),
            environment: "development".to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            rate_limit: RateLimitSettings {
                window_secs: 15 * 60,
                max_requests: 100,
                auth_max_requests: 20,
            },
            json_limit: 1024 * 1024,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment
    pub fn from_source<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let environment = lookup("NODE_ENV").unwrap_or(defaults.environment);
        let is_production = environment == "production";

        let mongodb_uri = lookup("MONGODB_URI").filter(|uri| !uri.trim().is_empty());
        if is_production && mongodb_uri.is_none() {
            return Err("MONGODB_URI must be set in production".to_string());
        }

        let secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if is_production => return Err("JWT_SECRET must be set in production".to_string()),
            None => {
                log::warn!("⚠️  JWT_SECRET not set, using development secret");
                defaults.jwt.secret
            }
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            mongodb_uri,
            jwt: JwtSettings {
                secret,
                issuer: lookup("JWT_ISSUER").unwrap_or(defaults.jwt.issuer),
                audience: lookup("JWT_AUDIENCE").unwrap_or(defaults.jwt.audience),
                expires_hours: parse_or(&lookup, "JWT_EXPIRES_HOURS", defaults.jwt.expires_hours),
                refresh_days: parse_or(&lookup, "JWT_REFRESH_DAYS", defaults.jwt.refresh_days),
            },
            frontend_url: lookup("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            environment,
            bcrypt_cost: parse_or(&lookup, "BCRYPT_COST", defaults.bcrypt_cost),
            rate_limit: RateLimitSettings {
                window_secs: parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", defaults.rate_limit.window_secs),
                max_requests: parse_or(&lookup, "RATE_LIMIT_MAX", defaults.rate_limit.max_requests),
                auth_max_requests: parse_or(
                    &lookup,
                    "AUTH_RATE_LIMIT_MAX",
                    defaults.rate_limit.auth_max_requests,
                ),
            },
            json_limit: parse_or(&lookup, "JSON_LIMIT_BYTES", defaults.json_limit),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️  Invalid value for {}: '{}', using default", key, raw);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_in_development() {
        let config = AppConfig::from_source(source(&[])).unwrap();
        assert_eq!(config.port, 5000);
        assert!(config.mongodb_uri.is_none());
        assert!(!config.is_production());
        assert_eq!(config.jwt.secret, DEV_JWT_SECRET);
    }

    #[test]
    fn test_production_requires_secret_and_database() {
        let missing_db = AppConfig::from_source(source(&[
            ("NODE_ENV", "production"),
            ("JWT_SECRET", "s3cret"),
        ]));
        assert!(missing_db.is_err());

        let missing_secret = AppConfig::from_source(source(&[
            ("NODE_ENV", "production"),
            ("MONGODB_URI", "mongodb://db:27017/aquawatch"),
        ]));
        assert!(missing_secret.is_err());
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = AppConfig::from_source(source(&[
            ("PORT", "not-a-port"),
            ("RATE_LIMIT_MAX", "250"),
        ]))
        .unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.rate_limit.max_requests, 250);
    }
}
