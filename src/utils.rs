/// Utility functions
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Extract number from JSON value
pub fn num(v: &Value) -> Option<f64> {
    if let Some(x) = v.as_f64() {
        return Some(x);
    }
    if let Some(s) = v.as_str() {
        return s.parse::<f64>().ok();
    }
    None
}

/// Walk a dotted path such as `main.temp` or `weather.0.description`
pub fn at_path<'a>(v: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(v, |cur, seg| match seg.parse::<usize>() {
        Ok(idx) => cur.get(idx),
        Err(_) => cur.get(seg),
    })
}

pub fn num_at(v: &Value, path: &str) -> Option<f64> {
    at_path(v, path).and_then(num)
}

pub fn str_at(v: &Value, path: &str) -> Option<String> {
    at_path(v, path)
        .and_then(|x| x.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Unix seconds at `path` as a UTC instant
pub fn unix_at(v: &Value, path: &str) -> Option<DateTime<Utc>> {
    at_path(v, path)
        .and_then(|x| x.as_i64())
        .and_then(|n| Utc.timestamp_opt(n, 0).single())
}

/// Round to `places` decimal digits
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
