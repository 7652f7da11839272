/// Business logic services layer
use crate::clients::{GeoClient, NotificationDispatcher, WeatherClient};
use crate::domain::{
    AlertRule, CityComparison, EnhancedReading, ForecastDay, ForecastPoint, GeoFix, HistoryEntry,
    ModelStats, NewAlertRule, Notification, Parameter, Reading,
};
use crate::errors::{ApiError, ApiResult};
use crate::model::{evaluate, forecast, Debouncer, ForecastSynthesizer, WeatherCache};
use crate::repo::{UserKvRepo, ALERTS_KEY, HISTORY_KEY, NOTIFICATIONS_KEY};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const MAX_FORECAST_HOURS: u32 = 120;
pub const MAX_FORECAST_DAYS: u32 = 16;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Weather lookup, dedup and forecast synthesis
pub struct WeatherService {
    client: WeatherClient,
    geo_client: GeoClient,
    cache: Mutex<WeatherCache>,
    synthesizer: Mutex<ForecastSynthesizer>,
}

impl WeatherService {
    pub fn new(
        client: WeatherClient,
        geo_client: GeoClient,
        cache: WeatherCache,
        synthesizer: ForecastSynthesizer,
    ) -> Self {
        Self {
            client,
            geo_client,
            cache: Mutex::new(cache),
            synthesizer: Mutex::new(synthesizer),
        }
    }

    /// Fetch current weather for a city, deduplicated through the cache
    pub async fn fetch_city(&self, city: &str) -> ApiResult<Reading> {
        let city = city.trim();
        if city.is_empty() {
            return Err(ApiError::InvalidInput("city is required".to_string()));
        }
        let reading = self.client.fetch_by_city(city).await?;
        Ok(self.accept(reading))
    }

    /// Fetch current weather for coordinates, deduplicated through the cache
    pub async fn fetch_coords(&self, lat: f64, lon: f64) -> ApiResult<Reading> {
        validate_coords(lat, lon)?;
        let reading = self.client.fetch_by_coords(lat, lon).await?;
        Ok(self.accept(reading))
    }

    /// Resolve a position then fetch its weather. A client-reported
    /// geolocation error code wins over coordinates; with neither, the
    /// server-side lookup runs.
    pub async fn fetch_located(
        &self,
        lat: Option<f64>,
        lon: Option<f64>,
        error_code: Option<u16>,
    ) -> ApiResult<Reading> {
        if let Some(code) = error_code {
            let err = ApiError::from_geolocation_code(code);
            warn!("Client geolocation failed: {}", err);
            return Err(err);
        }

        let fix = match (lat, lon) {
            (Some(lat), Some(lon)) => GeoFix { lat, lon },
            (None, None) => self.geo_client.locate().await?,
            _ => {
                return Err(ApiError::InvalidInput(
                    "lat and lon must be given together".to_string(),
                ))
            }
        };
        self.fetch_coords(fix.lat, fix.lon).await
    }

    /// Fetch several cities; failures are reported per city
    pub async fn compare(&self, cities: &[&str]) -> Vec<CityComparison> {
        let mut results = Vec::with_capacity(cities.len());
        for &city in cities {
            let outcome = self.fetch_city(city).await;
            results.push(match outcome {
                Ok(reading) => CityComparison {
                    city: city.to_string(),
                    reading: Some(reading),
                    error: None,
                },
                Err(e) => CityComparison {
                    city: city.to_string(),
                    reading: None,
                    error: Some(e.to_string()),
                },
            });
        }
        results
    }

    /// Run a freshly fetched reading through the dedup cache
    pub fn accept(&self, reading: Reading) -> Reading {
        lock(&self.cache).submit(reading)
    }

    /// Attach the synthesized 24h/7d series, confidence and trends
    pub fn enhance(&self, reading: Reading) -> EnhancedReading {
        let now = Utc::now();
        let (hourly_forecast, daily_forecast) = {
            let mut synth = lock(&self.synthesizer);
            (
                synth.predict_hourly(&reading, 24, now),
                synth.predict_daily(&reading, 7, now),
            )
        };
        EnhancedReading {
            confidence: forecast::confidence(&reading),
            trends: forecast::trends(&reading),
            hourly_forecast,
            daily_forecast,
            reading,
        }
    }

    pub fn hourly(&self, reading: &Reading, hours: u32) -> Vec<ForecastPoint> {
        let hours = hours.min(MAX_FORECAST_HOURS);
        lock(&self.synthesizer).predict_hourly(reading, hours, Utc::now())
    }

    pub fn daily(&self, reading: &Reading, days: u32) -> Vec<ForecastDay> {
        let days = days.min(MAX_FORECAST_DAYS);
        lock(&self.synthesizer).predict_daily(reading, days, Utc::now())
    }

    /// Purge stale cache entries
    pub fn cleanup_cache(&self) -> usize {
        let removed = lock(&self.cache).cleanup();
        if removed > 0 {
            info!("Purged {} stale weather cache entries", removed);
        }
        removed
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            cache_size: lock(&self.cache).len(),
            prediction_count: lock(&self.synthesizer).prediction_count(),
        }
    }
}

fn validate_coords(lat: f64, lon: f64) -> ApiResult<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(ApiError::InvalidInput(format!(
            "coordinates out of range: ({}, {})",
            lat, lon
        )));
    }
    Ok(())
}

/// Alert rules, edge-triggered evaluation and notifications, per user
pub struct AlertService {
    repo: UserKvRepo,
    dispatcher: NotificationDispatcher,
    debouncer: Debouncer<String>,
    // Serializes read-modify-write cycles on the stored lists.
    write_lock: tokio::sync::Mutex<()>,
}

impl AlertService {
    pub fn new(repo: UserKvRepo, dispatcher: NotificationDispatcher, debounce: Duration) -> Self {
        Self {
            repo,
            dispatcher,
            debouncer: Debouncer::new(debounce),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn list_rules(&self, user_id: &str) -> ApiResult<Vec<AlertRule>> {
        self.repo.load_list(user_id, ALERTS_KEY).await
    }

    /// Create a rule in the idle state
    pub async fn add_rule(&self, user_id: &str, new_rule: NewAlertRule) -> ApiResult<AlertRule> {
        let city = new_rule.city.trim();
        if city.is_empty() {
            return Err(ApiError::InvalidInput("city is required".to_string()));
        }
        if !new_rule.value.is_finite() {
            return Err(ApiError::InvalidInput(
                "threshold must be a finite number".to_string(),
            ));
        }

        let rule = AlertRule {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            city: city.to_string(),
            parameter: new_rule.parameter,
            condition: new_rule.condition,
            value: new_rule.value,
            unit: new_rule
                .unit
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| default_unit(new_rule.parameter).to_string()),
            is_active: new_rule.is_active.unwrap_or(true),
            triggered: false,
            trigger_count: 0,
            created_at: Utc::now(),
            last_checked: None,
            last_triggered: None,
        };

        let _guard = self.write_lock.lock().await;
        let mut rules: Vec<AlertRule> = self.repo.load_list(user_id, ALERTS_KEY).await?;
        rules.push(rule.clone());
        self.repo.save_list(user_id, ALERTS_KEY, &rules).await?;
        info!("User {} created alert {} ({})", user_id, rule.id, rule.describe());
        Ok(rule)
    }

    pub async fn remove_rule(&self, user_id: &str, alert_id: &str) -> ApiResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut rules: Vec<AlertRule> = self.repo.load_list(user_id, ALERTS_KEY).await?;
        let before = rules.len();
        rules.retain(|r| r.id != alert_id);
        if rules.len() == before {
            return Err(ApiError::RecordNotFound(format!("alert {}", alert_id)));
        }
        self.repo.save_list(user_id, ALERTS_KEY, &rules).await
    }

    /// Flip the active flag
    pub async fn toggle_rule(&self, user_id: &str, alert_id: &str) -> ApiResult<AlertRule> {
        let _guard = self.write_lock.lock().await;
        let mut rules: Vec<AlertRule> = self.repo.load_list(user_id, ALERTS_KEY).await?;
        let rule = rules
            .iter_mut()
            .find(|r| r.id == alert_id)
            .ok_or_else(|| ApiError::RecordNotFound(format!("alert {}", alert_id)))?;
        rule.is_active = !rule.is_active;
        let toggled = rule.clone();
        self.repo.save_list(user_id, ALERTS_KEY, &rules).await?;
        Ok(toggled)
    }

    /// Schedule a debounced evaluation; a newer reading for the same user
    /// within the debounce delay replaces this one. Nameless readings can
    /// match no rule and are not scheduled.
    pub fn check(self: &Arc<Self>, user_id: &str, reading: Reading) -> bool {
        if reading.name.trim().is_empty() {
            debug!("Skipping alert check for {}: reading has no location name", user_id);
            return false;
        }
        let service = Arc::clone(self);
        let user = user_id.to_string();
        self.debouncer.schedule(user_id.to_string(), async move {
            if let Err(e) = service.evaluate_now(&user, &reading).await {
                error!("Alert evaluation for {} failed: {:?}", user, e);
            }
        });
        true
    }

    /// Evaluate immediately and persist whatever changed
    pub async fn evaluate_now(
        &self,
        user_id: &str,
        reading: &Reading,
    ) -> ApiResult<Vec<Notification>> {
        let _guard = self.write_lock.lock().await;
        let rules: Vec<AlertRule> = self.repo.load_list(user_id, ALERTS_KEY).await?;
        if rules.is_empty() {
            return Ok(Vec::new());
        }

        let evaluation = evaluate(&rules, reading, Utc::now());

        // Latches go first so a failed notification write cannot re-fire.
        if evaluation.rules_changed {
            self.repo
                .save_list(user_id, ALERTS_KEY, &evaluation.rules)
                .await?;
        }

        if !evaluation.notifications.is_empty() {
            let mut all: Vec<Notification> =
                self.repo.load_list(user_id, NOTIFICATIONS_KEY).await?;
            all.extend(evaluation.notifications.iter().cloned());
            self.repo.save_list(user_id, NOTIFICATIONS_KEY, &all).await?;

            for n in &evaluation.notifications {
                self.dispatcher.display(&n.message);
            }
        }

        Ok(evaluation.notifications)
    }

    pub async fn notifications(&self, user_id: &str) -> ApiResult<Vec<Notification>> {
        self.repo.load_list(user_id, NOTIFICATIONS_KEY).await
    }

    pub async fn unread_count(&self, user_id: &str) -> ApiResult<usize> {
        let all = self.notifications(user_id).await?;
        Ok(all.iter().filter(|n| !n.read).count())
    }

    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> ApiResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut all: Vec<Notification> = self.repo.load_list(user_id, NOTIFICATIONS_KEY).await?;
        let n = all
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| ApiError::RecordNotFound(format!("notification {}", notification_id)))?;
        n.read = true;
        self.repo.save_list(user_id, NOTIFICATIONS_KEY, &all).await
    }

    pub async fn clear_notifications(&self, user_id: &str) -> ApiResult<()> {
        let _guard = self.write_lock.lock().await;
        self.repo
            .save_list::<Notification>(user_id, NOTIFICATIONS_KEY, &[])
            .await
    }
}

fn default_unit(parameter: Parameter) -> &'static str {
    match parameter {
        Parameter::Temperature => "°C",
        Parameter::Humidity => "%",
        Parameter::WindSpeed => "m/s",
        Parameter::Pressure => "hPa",
    }
}

/// Per-user search history, newest first
pub struct HistoryService {
    repo: UserKvRepo,
    limit: usize,
    write_lock: tokio::sync::Mutex<()>,
}

impl HistoryService {
    pub fn new(repo: UserKvRepo, limit: usize) -> Self {
        Self {
            repo,
            limit: limit.max(1),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn record(&self, user_id: &str, reading: &Reading) -> ApiResult<HistoryEntry> {
        let entry = HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            city: reading.name.clone(),
            country: reading.country.clone(),
            temperature: reading.temperature,
            humidity: reading.humidity,
            pressure: reading.pressure,
            wind_speed: reading.wind_speed,
            description: reading.description.clone(),
            searched_at: Utc::now(),
        };

        let _guard = self.write_lock.lock().await;
        let mut history: Vec<HistoryEntry> = self.repo.load_list(user_id, HISTORY_KEY).await?;
        history.insert(0, entry.clone());
        history.truncate(self.limit);
        self.repo.save_list(user_id, HISTORY_KEY, &history).await?;
        Ok(entry)
    }

    pub async fn list(&self, user_id: &str) -> ApiResult<Vec<HistoryEntry>> {
        self.repo.load_list(user_id, HISTORY_KEY).await
    }

    pub async fn clear(&self, user_id: &str) -> ApiResult<()> {
        let _guard = self.write_lock.lock().await;
        self.repo.delete(user_id, HISTORY_KEY).await
    }
}
