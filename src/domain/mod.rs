/// Domain models for the application
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One observed weather snapshot for a named location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub name: String,
    pub country: String,
    /// °C
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feels_like: Option<f64>,
    /// %
    pub humidity: f64,
    /// hPa
    pub pressure: f64,
    /// m/s
    pub wind_speed: f64,
    /// metres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    pub description: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// Shift of the location's clock from UTC, in seconds.
    #[serde(default)]
    pub timezone_offset_secs: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<DateTime<Utc>>,
}

impl Reading {
    pub fn value_of(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Temperature => self.temperature,
            Parameter::Humidity => self.humidity,
            Parameter::WindSpeed => self.wind_speed,
            Parameter::Pressure => self.pressure,
        }
    }
}

/// Weather field an alert rule can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Temperature,
    Humidity,
    #[serde(alias = "windSpeed")]
    WindSpeed,
    Pressure,
}

impl Parameter {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::WindSpeed => "Wind Speed",
            Self::Pressure => "Pressure",
        }
    }
}

/// Comparison applied between the observed value and the rule threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = "=")]
    Equal,
}

/// Tolerance for `=` rules.
pub const EQUALITY_EPSILON: f64 = 0.1;

impl Comparator {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::GreaterEqual => value >= threshold,
            Self::LessEqual => value <= threshold,
            Self::Equal => (value - threshold).abs() < EQUALITY_EPSILON,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterEqual => ">=",
            Self::LessEqual => "<=",
            Self::Equal => "=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// User-owned threshold rule with an edge-trigger latch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub user_id: String,
    pub city: String,
    pub parameter: Parameter,
    pub condition: Comparator,
    pub value: f64,
    pub unit: String,
    pub is_active: bool,
    pub triggered: bool,
    pub trigger_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,
}

impl AlertRule {
    /// Case-insensitive match where either name may contain the other.
    /// A blank location never matches.
    pub fn matches_location(&self, location: &str) -> bool {
        let location = location.trim().to_lowercase();
        if location.is_empty() {
            return false;
        }
        let city = self.city.to_lowercase();
        city.contains(&location) || location.contains(&city)
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {} {}{}",
            self.parameter.label(),
            self.condition,
            self.value,
            self.unit
        )
    }
}

/// Request body for creating a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAlertRule {
    pub city: String,
    pub parameter: Parameter,
    pub condition: Comparator,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub alert_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// Synthesized hourly value, display only.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    pub hour: u32,
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub condition: &'static str,
    pub precipitation_chance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub condition: &'static str,
    pub humidity: f64,
    pub precipitation_chance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trends {
    pub temperature_trend: &'static str,
    pub pressure_trend: &'static str,
    pub humidity_trend: &'static str,
    pub wind_trend: &'static str,
}

/// Reading plus everything derived from it for display.
#[derive(Debug, Serialize)]
pub struct EnhancedReading {
    #[serde(flatten)]
    pub reading: Reading,
    pub hourly_forecast: Vec<ForecastPoint>,
    pub daily_forecast: Vec<ForecastDay>,
    pub confidence: f64,
    pub trends: Trends,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub description: String,
    pub searched_at: DateTime<Utc>,
}

/// Per-city outcome of a comparison request
#[derive(Debug, Serialize)]
pub struct CityComparison {
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<Reading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoFix {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize)]
pub struct ModelStats {
    pub cache_size: usize,
    pub prediction_count: u64,
}

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
}
