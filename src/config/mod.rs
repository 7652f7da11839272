/// Application configuration module
use anyhow::Context;
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub weather_api_url: String,
    pub weather_api_key: String,
    pub geolocation: GeolocationSettings,
    pub cache: CacheSettings,
    pub alerts: AlertSettings,
    pub history_limit: usize,
    pub forecast_seed: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct GeolocationSettings {
    pub url: String,
    pub enabled: bool,
    pub timeout_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct CacheSettings {
    pub dedup_window_seconds: u64,
    pub max_age_seconds: u64,
    pub cleanup_every_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct AlertSettings {
    pub debounce_ms: u64,
    pub notification_permission: NotificationPermission,
    pub webhook_url: Option<String>,
}

/// Mirrors the three states a notification permission prompt can be in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationPermission {
    Granted,
    Denied,
    Default,
}

impl NotificationPermission {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "granted" => Self::Granted,
            "denied" => Self::Denied,
            _ => Self::Default,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let weather_api_url = env::var("WEATHER_API_URL")
            .unwrap_or_else(|_| "https://api.openweathermap.org/data/2.5".to_string());

        let weather_api_key =
            env::var("WEATHER_API_KEY").context("WEATHER_API_KEY is required")?;

        let geolocation = GeolocationSettings {
            url: env::var("GEOLOCATION_URL")
                .unwrap_or_else(|_| "http://ip-api.com/json".to_string()),
            enabled: env_bool("GEOLOCATION_ENABLED", true),
            timeout_seconds: env_u64("GEOLOCATION_TIMEOUT_SECONDS", 15),
        };

        let cache = CacheSettings {
            dedup_window_seconds: env_u64("DEDUP_WINDOW_SECONDS", 600), // 10m
            max_age_seconds: env_u64("CACHE_MAX_AGE_SECONDS", 3600),    // 1h
            cleanup_every_seconds: env_u64("CACHE_CLEANUP_EVERY_SECONDS", 300),
        };

        let alerts = AlertSettings {
            debounce_ms: env_u64("ALERT_DEBOUNCE_MS", 1000),
            notification_permission: NotificationPermission::parse(
                &env::var("NOTIFICATION_PERMISSION").unwrap_or_default(),
            ),
            webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.is_empty()),
        };

        let forecast_seed = env::var("FORECAST_SEED")
            .ok()
            .and_then(|s| s.parse().ok());

        Ok(Self {
            database_url,
            bind_addr,
            weather_api_url,
            weather_api_key,
            geolocation,
            cache,
            alerts,
            history_limit: env_u64("HISTORY_LIMIT", 50) as usize,
            forecast_seed,
        })
    }
}

impl CacheSettings {
    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_window_seconds as i64)
    }

    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_age_seconds as i64)
    }
}

impl AlertSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_parsing_defaults_to_prompt_state() {
        assert_eq!(
            NotificationPermission::parse("Granted"),
            NotificationPermission::Granted
        );
        assert_eq!(
            NotificationPermission::parse("denied"),
            NotificationPermission::Denied
        );
        assert_eq!(
            NotificationPermission::parse(""),
            NotificationPermission::Default
        );
        assert_eq!(
            NotificationPermission::parse("maybe"),
            NotificationPermission::Default
        );
    }

    #[test]
    fn cache_windows_stay_independent() {
        let cache = CacheSettings {
            dedup_window_seconds: 600,
            max_age_seconds: 3600,
            cleanup_every_seconds: 300,
        };
        assert_eq!(cache.dedup_window(), chrono::Duration::minutes(10));
        assert_eq!(cache.max_age(), chrono::Duration::hours(1));
    }
}
