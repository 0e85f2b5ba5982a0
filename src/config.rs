use std::env;

use crate::error::AppError;

const MIN_LEAD_DAYS: i64 = 3;
const MAX_LEAD_DAYS: i64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub payment_queue_size: usize,
    pub event_buffer_size: usize,
    pub seed_path: Option<String>,
    pub fulfillment: FulfillmentSettings,
}

#[derive(Debug, Clone)]
pub struct FulfillmentSettings {
    pub lead_time_days: i64,
    pub default_country: String,
    pub default_state: String,
    pub default_city: String,
    pub placeholder_street: String,
}

impl Default for FulfillmentSettings {
    fn default() -> Self {
        Self {
            lead_time_days: MIN_LEAD_DAYS,
            default_country: "Bolivia".to_string(),
            default_state: "Santa Cruz".to_string(),
            default_city: "Santa Cruz de la Sierra".to_string(),
            placeholder_street: "Address pending confirmation".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            payment_queue_size: 1024,
            event_buffer_size: 1024,
            seed_path: None,
            fulfillment: FulfillmentSettings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = FulfillmentSettings::default();

        let lead_time_days = parse_or_default(&lookup, "DELIVERY_LEAD_DAYS", MIN_LEAD_DAYS)?;
        if !(MIN_LEAD_DAYS..=MAX_LEAD_DAYS).contains(&lead_time_days) {
            return Err(AppError::Internal(format!(
                "invalid DELIVERY_LEAD_DAYS: {lead_time_days} is outside {MIN_LEAD_DAYS}..={MAX_LEAD_DAYS}"
            )));
        }

        Ok(Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", 3000)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            payment_queue_size: parse_capacity(&lookup, "PAYMENT_QUEUE_SIZE")?,
            event_buffer_size: parse_capacity(&lookup, "EVENT_BUFFER_SIZE")?,
            seed_path: lookup("SEED_PATH").filter(|path| !path.trim().is_empty()),
            fulfillment: FulfillmentSettings {
                lead_time_days,
                default_country: lookup("DEFAULT_COUNTRY").unwrap_or(defaults.default_country),
                default_state: lookup("DEFAULT_STATE").unwrap_or(defaults.default_state),
                default_city: lookup("DEFAULT_CITY").unwrap_or(defaults.default_city),
                placeholder_street: lookup("PLACEHOLDER_STREET")
                    .unwrap_or(defaults.placeholder_street),
            },
        })
    }
}

// Channel capacities; tokio rejects zero.
fn parse_capacity<F>(lookup: &F, key: &str) -> Result<usize, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let capacity = parse_or_default(lookup, key, 1024)?;
    if capacity == 0 {
        return Err(AppError::Internal(format!("invalid {key}: must be > 0")));
    }
    Ok(capacity)
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}
