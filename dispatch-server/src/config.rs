//! Server configuration

use chrono::FixedOffset;
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// MySQL connection URL
    pub database_url: String,
    /// HTTP port (API + WebSocket)
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// JWT secret for bearer tokens
    pub jwt_secret: String,
    /// Payment bridge base URL
    pub pay_gateway_url: String,
    /// URL the provider calls back on payment
    pub pay_notify_url: String,
    /// Shared secret for request and callback signatures
    pub pay_gateway_secret: String,
    /// Bound on every external call
    pub upstream_timeout: Duration,
    pub prepay_ttl: Duration,
    pub prepay_sweep_interval: Duration,
    pub location_ttl: Duration,
    pub settings_cache_ttl: Duration,
    /// Fixed regional zone for months and dates
    pub timezone: FixedOffset,
    /// `json` switches the log formatter
    pub log_format: Option<String>,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn secs(name: &str, default: u64) -> Duration {
        Duration::from_secs(
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default),
        )
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let http_port = std::env::var("HTTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let offset_hours: i32 = std::env::var("TIMEZONE_OFFSET_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8);
        let timezone = FixedOffset::east_opt(offset_hours * 3600)
            .ok_or("TIMEZONE_OFFSET_HOURS must be within -23..=23")?;

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port,
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            pay_gateway_url: std::env::var("PAY_GATEWAY_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9300".into()),
            pay_notify_url: std::env::var("PAY_NOTIFY_URL")
                .unwrap_or_else(|_| format!("http://127.0.0.1:{http_port}/pay/notify")),
            pay_gateway_secret: Self::require_secret("PAY_GATEWAY_SECRET", &environment)?,
            upstream_timeout: Self::secs("UPSTREAM_TIMEOUT_SECS", 10),
            prepay_ttl: Self::secs("PREPAY_TTL_SECS", 1800),
            prepay_sweep_interval: Self::secs("PREPAY_SWEEP_SECS", 300),
            location_ttl: Self::secs("LOCATION_TTL_SECS", 300),
            settings_cache_ttl: Self::secs("SETTINGS_CACHE_SECS", 60),
            timezone,
            log_format: std::env::var("LOG_FORMAT").ok().filter(|s| !s.is_empty()),
            environment,
        })
    }
}
