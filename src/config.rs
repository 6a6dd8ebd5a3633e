use std::env;

use rust_decimal::Decimal;

use crate::error::AppError;
use crate::models::cost::DEFAULT_RATE_PER_KM;
use crate::models::delivery::default_per_card_fee;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub pricing: Pricing,
}

/// Rates used when a lifecycle call does not supply its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Pricing {
    pub per_card_fee: Decimal,
    pub rate_per_km: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            per_card_fee: default_per_card_fee(),
            rate_per_km: DEFAULT_RATE_PER_KM,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let pricing = Pricing {
            per_card_fee: parse_or_default("DEFAULT_PER_CARD_FEE", default_per_card_fee())?,
            rate_per_km: parse_or_default("DEFAULT_RATE_PER_KM", DEFAULT_RATE_PER_KM)?,
        };

        if pricing.per_card_fee.is_sign_negative() {
            return Err(AppError::Internal(
                "invalid DEFAULT_PER_CARD_FEE: must not be negative".to_string(),
            ));
        }
        if !pricing.rate_per_km.is_finite() || pricing.rate_per_km < 0.0 {
            return Err(AppError::Internal(
                "invalid DEFAULT_RATE_PER_KM: must be a non-negative number".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            pricing,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
