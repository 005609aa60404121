//! Application state

use chrono::FixedOffset;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;

use crate::config::Config;
use crate::live::RiderLocationHub;
use crate::orders::PrepayCache;
use crate::payment::{HttpGateway, PaymentGateway};
use crate::settings::SettingsCache;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// MySQL connection pool
    pub pool: MySqlPool,
    /// FeeParameters read-through cache
    pub settings: Arc<SettingsCache>,
    /// Online orders awaiting their payment callback
    pub prepay: Arc<PrepayCache>,
    /// Live rider positions and admin fan-out
    pub riders: Arc<RiderLocationHub>,
    /// Payment provider bridge
    pub gateway: Arc<dyn PaymentGateway>,
    /// JWT secret for bearer tokens
    pub jwt_secret: String,
    /// Secret the provider signs callbacks with
    pub pay_callback_secret: String,
    /// Regional zone for months and dates
    pub zone: FixedOffset,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(20)
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let gateway = HttpGateway::new(
            &config.pay_gateway_url,
            &config.pay_notify_url,
            &config.pay_gateway_secret,
            config.upstream_timeout,
        );

        Ok(Self {
            pool,
            settings: Arc::new(SettingsCache::new(config.settings_cache_ttl)),
            prepay: Arc::new(PrepayCache::new(chrono::Duration::from_std(
                config.prepay_ttl,
            )?)),
            riders: Arc::new(RiderLocationHub::new(chrono::Duration::from_std(
                config.location_ttl,
            )?)),
            gateway: Arc::new(gateway),
            jwt_secret: config.jwt_secret.clone(),
            pay_callback_secret: config.pay_gateway_secret.clone(),
            zone: config.timezone,
        })
    }
}
