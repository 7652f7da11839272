/// HTTP request handlers
use crate::domain::{EnhancedReading, Health, ModelStats, NewAlertRule, Reading};
use crate::errors::{ApiError, ApiResult};
use crate::services::{AlertService, HistoryService, WeatherService};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Most cities accepted by one comparison request
const MAX_COMPARE_CITIES: usize = 10;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub weather_service: Arc<WeatherService>,
    pub alert_service: Arc<AlertService>,
    pub history_service: Arc<HistoryService>,
}

/// Successful response wrapper
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

type JsonResult<T> = Result<Json<SuccessResponse<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> JsonResult<T> {
    Ok(Json(SuccessResponse::new(data)))
}

fn required<'a>(params: &'a HashMap<String, String>, key: &str) -> ApiResult<&'a str> {
    params
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::InvalidInput(format!("{} is required", key)))
}

fn parse_opt<T: std::str::FromStr>(
    params: &HashMap<String, String>,
    key: &str,
) -> ApiResult<Option<T>> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::InvalidInput(format!("{} is not a valid number", key))),
        None => Ok(None),
    }
}

/// Record history and schedule an alert check for the searching user
async fn after_fetch(state: &AppState, params: &HashMap<String, String>, reading: &Reading) {
    let Some(user_id) = params.get("user_id").filter(|s| !s.is_empty()) else {
        return;
    };
    if let Err(e) = state.history_service.record(user_id, reading).await {
        warn!("Failed to record search history for {}: {:?}", user_id, e);
    }
    state.alert_service.check(user_id, reading.clone());
}

/// Health check handler
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        now: Utc::now(),
    })
}

/// Current weather for a city
pub async fn get_weather(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> JsonResult<EnhancedReading> {
    let city = required(&params, "city")?;
    let reading = state.weather_service.fetch_city(city).await?;
    after_fetch(&state, &params, &reading).await;
    ok(state.weather_service.enhance(reading))
}

/// Current weather for coordinates
pub async fn get_weather_by_coords(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> JsonResult<EnhancedReading> {
    let lat = parse_opt::<f64>(&params, "lat")?
        .ok_or_else(|| ApiError::InvalidInput("lat is required".to_string()))?;
    let lon = parse_opt::<f64>(&params, "lon")?
        .ok_or_else(|| ApiError::InvalidInput("lon is required".to_string()))?;
    let reading = state.weather_service.fetch_coords(lat, lon).await?;
    after_fetch(&state, &params, &reading).await;
    ok(state.weather_service.enhance(reading))
}

/// Current weather for the caller's position
pub async fn get_weather_here(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> JsonResult<EnhancedReading> {
    let lat = parse_opt::<f64>(&params, "lat")?;
    let lon = parse_opt::<f64>(&params, "lon")?;
    let code = parse_opt::<u16>(&params, "code")?;
    let reading = state.weather_service.fetch_located(lat, lon, code).await?;
    after_fetch(&state, &params, &reading).await;
    ok(state.weather_service.enhance(reading))
}

/// Compare several cities side by side
pub async fn compare_cities(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    let raw = required(&params, "cities")?;
    let cities: Vec<&str> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if cities.len() > MAX_COMPARE_CITIES {
        return Err(ApiError::InvalidInput(format!(
            "at most {} cities can be compared",
            MAX_COMPARE_CITIES
        )));
    }

    let items = state.weather_service.compare(&cities).await;
    ok(json!({ "items": items }))
}

/// Synthesized hourly series for a city
pub async fn get_hourly_forecast(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    let city = required(&params, "city")?;
    let hours = parse_opt::<u32>(&params, "hours")?.unwrap_or(24);
    let reading = state.weather_service.fetch_city(city).await?;
    let hourly = state.weather_service.hourly(&reading, hours);
    ok(json!({ "city": reading.name, "hourly": hourly }))
}

/// Synthesized daily series for a city
pub async fn get_daily_forecast(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    let city = required(&params, "city")?;
    let days = parse_opt::<u32>(&params, "days")?.unwrap_or(7);
    let reading = state.weather_service.fetch_city(city).await?;
    let daily = state.weather_service.daily(&reading, days);
    ok(json!({ "city": reading.name, "daily": daily }))
}

pub async fn get_model_stats(State(state): State<AppState>) -> JsonResult<ModelStats> {
    ok(state.weather_service.stats())
}

pub async fn cleanup_model(State(state): State<AppState>) -> JsonResult<Value> {
    let removed = state.weather_service.cleanup_cache();
    ok(json!({ "removed": removed }))
}

pub async fn list_alerts(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    let alerts = state.alert_service.list_rules(&user_id).await?;
    ok(json!({ "alerts": alerts }))
}

pub async fn create_alert(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<NewAlertRule>,
) -> JsonResult<Value> {
    let alert = state.alert_service.add_rule(&user_id, body).await?;
    ok(json!({ "alert": alert }))
}

pub async fn delete_alert(
    Path((user_id, alert_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    state.alert_service.remove_rule(&user_id, &alert_id).await?;
    ok(json!({ "deleted": alert_id }))
}

pub async fn toggle_alert(
    Path((user_id, alert_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    let alert = state.alert_service.toggle_rule(&user_id, &alert_id).await?;
    ok(json!({ "alert": alert }))
}

/// Queue a debounced evaluation of a posted reading
pub async fn check_alerts(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Json(reading): Json<Reading>,
) -> JsonResult<Value> {
    let scheduled = state.alert_service.check(&user_id, reading);
    ok(json!({ "scheduled": scheduled }))
}

pub async fn list_notifications(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    let notifications = state.alert_service.notifications(&user_id).await?;
    let unread_count = notifications.iter().filter(|n| !n.read).count();
    ok(json!({
        "notifications": notifications,
        "unread_count": unread_count,
    }))
}

pub async fn mark_notification_read(
    Path((user_id, notification_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    state
        .alert_service
        .mark_read(&user_id, &notification_id)
        .await?;
    ok(json!({ "read": notification_id }))
}

pub async fn clear_notifications(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    state.alert_service.clear_notifications(&user_id).await?;
    ok(json!({ "cleared": true }))
}

pub async fn list_history(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    let history = state.history_service.list(&user_id).await?;
    ok(json!({ "history": history }))
}

pub async fn clear_history(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> JsonResult<Value> {
    state.history_service.clear(&user_id).await?;
    ok(json!({ "cleared": true }))
}
