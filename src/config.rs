use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::models::courier::GeoPoint;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub dispatch: DispatchSettings,
}

/// Tunables for candidate selection and the claim.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub default_max_distance_km: f64,
    pub max_active_orders: u32,
    /// Kilometres of effective cost added per in-flight order.
    pub load_penalty_km: f64,
    pub courier_earning_share: f64,
    /// Used when neither the request nor the order carries a pickup point.
    pub fallback_pickup: GeoPoint,
    /// Pre-filter radius for the candidate snapshot. `None` reads the whole pool.
    pub snapshot_radius_km: Option<f64>,
    pub snapshot_timeout: Duration,
    pub claim_retry_backoff: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_max_distance_km: 10.0,
            max_active_orders: 3,
            load_penalty_km: 2.0,
            courier_earning_share: 0.8,
            fallback_pickup: GeoPoint {
                lat: -6.2088,
                lng: 106.8456,
            },
            snapshot_radius_km: None,
            snapshot_timeout: Duration::from_millis(2_000),
            claim_retry_backoff: Duration::from_millis(50),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = DispatchSettings::default();
        let dispatch = DispatchSettings {
            default_max_distance_km: parse_or_default(
                "DEFAULT_MAX_DISTANCE_KM",
                defaults.default_max_distance_km,
            )?,
            max_active_orders: parse_or_default("MAX_ACTIVE_ORDERS", defaults.max_active_orders)?,
            load_penalty_km: parse_or_default("LOAD_PENALTY_KM", defaults.load_penalty_km)?,
            courier_earning_share: parse_or_default(
                "COURIER_EARNING_SHARE",
                defaults.courier_earning_share,
            )?,
            fallback_pickup: GeoPoint {
                lat: parse_or_default("FALLBACK_PICKUP_LAT", defaults.fallback_pickup.lat)?,
                lng: parse_or_default("FALLBACK_PICKUP_LNG", defaults.fallback_pickup.lng)?,
            },
            snapshot_radius_km: parse_optional("SNAPSHOT_RADIUS_KM")?,
            snapshot_timeout: Duration::from_millis(parse_or_default("SNAPSHOT_TIMEOUT_MS", 2_000)?),
            claim_retry_backoff: Duration::from_millis(parse_or_default(
                "CLAIM_RETRY_BACKOFF_MS",
                50,
            )?),
        };
        dispatch.validate()?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            dispatch,
        })
    }
}

impl DispatchSettings {
    fn validate(&self) -> Result<(), AppError> {
        if !(self.default_max_distance_km.is_finite() && self.default_max_distance_km > 0.0) {
            return Err(AppError::Internal(
                "DEFAULT_MAX_DISTANCE_KM must be a positive number".to_string(),
            ));
        }
        if self.max_active_orders == 0 {
            return Err(AppError::Internal("MAX_ACTIVE_ORDERS must be > 0".to_string()));
        }
        if !(self.load_penalty_km.is_finite() && self.load_penalty_km >= 0.0) {
            return Err(AppError::Internal(
                "LOAD_PENALTY_KM must be a non-negative number".to_string(),
            ));
        }
        if let Some(radius) = self.snapshot_radius_km
            && !(radius.is_finite() && radius > 0.0)
        {
            return Err(AppError::Internal(
                "SNAPSHOT_RADIUS_KM must be a positive number".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.courier_earning_share) {
            return Err(AppError::Internal(
                "COURIER_EARNING_SHARE must be within 0..=1".to_string(),
            ));
        }
        if !self.fallback_pickup.is_valid() {
            return Err(AppError::Internal(
                "FALLBACK_PICKUP_LAT/LNG out of range".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(key)?.unwrap_or(default))
}

fn parse_optional<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(None),
    }
}
