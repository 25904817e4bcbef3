use std::{env, str::FromStr};

use anyhow::Context;

use crate::pricing::suggestion::PricingRules;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Flat delivery fee in dinars added to every order.
    pub shipping_fee: i64,
    pub pricing: PricingRules,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_or("APP_PORT", 3000)?;
        let shipping_fee: i64 = env_or("SHIPPING_FEE", 0)?;
        if shipping_fee < 0 {
            anyhow::bail!("SHIPPING_FEE must not be negative");
        }

        let defaults = PricingRules::default();
        let pricing = PricingRules {
            very_low_stock: env_or("PRICING_VERY_LOW_STOCK", defaults.very_low_stock)?,
            low_stock: env_or("PRICING_LOW_STOCK", defaults.low_stock)?,
            overstock: env_or("PRICING_OVERSTOCK", defaults.overstock)?,
            high_demand_units: env_or("PRICING_HIGH_DEMAND_UNITS", defaults.high_demand_units)?,
            low_demand_units: env_or("PRICING_LOW_DEMAND_UNITS", defaults.low_demand_units)?,
            demand_window_days: env_or("PRICING_DEMAND_WINDOW_DAYS", defaults.demand_window_days)?,
            min_change_percent: env_or("PRICING_MIN_CHANGE_PERCENT", defaults.min_change_percent)?,
        };

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            shipping_fee,
            pricing,
        })
    }
}

/// Parse an optional variable, falling back to `default` when it is unset.
/// A set but malformed value is an error rather than silently ignored.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        Err(_) => Ok(default),
    }
}
