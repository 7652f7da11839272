//! Staleness-tolerant dedup of incoming readings, keyed by location.

use crate::domain::Reading;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    reading: Reading,
    accepted_at: DateTime<Utc>,
}

/// The dedup window gates reuse; the max age only gates purging. Entries
/// between the two are replaced on the next submit but survive cleanup.
#[derive(Debug)]
pub struct WeatherCache {
    entries: HashMap<String, CacheEntry>,
    dedup_window: Duration,
    max_age: Duration,
}

impl Default for WeatherCache {
    fn default() -> Self {
        Self::new(Duration::minutes(10), Duration::hours(1))
    }
}

impl WeatherCache {
    pub fn new(dedup_window: Duration, max_age: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            dedup_window,
            max_age,
        }
    }

    /// Named readings key on name and country; nameless ones on their
    /// rounded coordinates.
    pub fn key(reading: &Reading) -> String {
        if reading.name.trim().is_empty() {
            return format!(
                "@{:.2},{:.2}",
                reading.lat.unwrap_or_default(),
                reading.lon.unwrap_or_default()
            );
        }
        format!(
            "{}_{}",
            reading.name.to_lowercase(),
            reading.country.to_lowercase()
        )
    }

    pub fn submit(&mut self, reading: Reading) -> Reading {
        self.submit_at(reading, Utc::now())
    }

    /// Returns the cached reading if it was accepted less than the dedup
    /// window ago, otherwise stores and returns `reading`.
    pub fn submit_at(&mut self, reading: Reading, now: DateTime<Utc>) -> Reading {
        let key = Self::key(&reading);

        if let Some(entry) = self.entries.get(&key) {
            if now - entry.accepted_at < self.dedup_window {
                debug!("Reusing cached reading for {}", key);
                return entry.reading.clone();
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                reading: reading.clone(),
                accepted_at: now,
            },
        );
        reading
    }

    pub fn cleanup(&mut self) -> usize {
        self.cleanup_at(Utc::now())
    }

    /// Drops entries older than the max age and returns how many went.
    pub fn cleanup_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let max_age = self.max_age;
        self.entries.retain(|_, entry| now - entry.accepted_at <= max_age);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(name: &str, temp: f64) -> Reading {
        Reading {
            name: name.into(),
            country: "GB".into(),
            temperature: temp,
            feels_like: None,
            humidity: 60.0,
            pressure: 1012.0,
            wind_speed: 3.0,
            visibility: Some(10000.0),
            description: "few clouds".into(),
            observed_at: Utc::now(),
            lat: None,
            lon: None,
            timezone_offset_secs: 0,
            sunrise: None,
            sunset: None,
        }
    }

    #[test]
    fn second_submit_within_window_returns_first() {
        let mut cache = WeatherCache::default();
        let t0 = Utc::now();

        let first = cache.submit_at(reading("London", 10.0), t0);
        let second = cache.submit_at(reading("London", 12.0), t0 + Duration::minutes(9));

        assert_eq!(first.temperature, 10.0);
        assert_eq!(second.temperature, 10.0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn submit_after_window_replaces_entry() {
        let mut cache = WeatherCache::default();
        let t0 = Utc::now();

        cache.submit_at(reading("London", 10.0), t0);
        let second = cache.submit_at(reading("London", 12.0), t0 + Duration::minutes(10));
        assert_eq!(second.temperature, 12.0);

        // The replacement restarts the window.
        let third = cache.submit_at(reading("London", 14.0), t0 + Duration::minutes(15));
        assert_eq!(third.temperature, 12.0);
    }

    #[test]
    fn key_ignores_case() {
        let mut cache = WeatherCache::default();
        let t0 = Utc::now();

        cache.submit_at(reading("London", 10.0), t0);
        let mut upper = reading("LONDON", 15.0);
        upper.country = "gb".into();
        assert_eq!(cache.submit_at(upper, t0).temperature, 10.0);
    }

    #[test]
    fn nameless_readings_key_on_coordinates() {
        let mut cache = WeatherCache::default();
        let t0 = Utc::now();

        let mut atlantic = reading("", 18.0);
        atlantic.country = String::new();
        atlantic.lat = Some(30.0);
        atlantic.lon = Some(-40.0);
        let mut pacific = atlantic.clone();
        pacific.temperature = 25.0;
        pacific.lon = Some(-150.0);

        cache.submit_at(atlantic, t0);
        assert_eq!(cache.submit_at(pacific, t0).temperature, 25.0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn distinct_locations_do_not_collide() {
        let mut cache = WeatherCache::default();
        let t0 = Utc::now();

        cache.submit_at(reading("London", 10.0), t0);
        let paris = cache.submit_at(reading("Paris", 18.0), t0);
        assert_eq!(paris.temperature, 18.0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cleanup_purges_only_entries_older_than_max_age() {
        let mut cache = WeatherCache::default();
        let t0 = Utc::now();

        cache.submit_at(reading("Old", 1.0), t0 - Duration::minutes(61));
        cache.submit_at(reading("Mid", 2.0), t0 - Duration::minutes(30));
        cache.submit_at(reading("New", 3.0), t0 - Duration::minutes(1));

        assert_eq!(cache.cleanup_at(t0), 1);
        assert_eq!(cache.len(), 2);

        // "Mid" is past the dedup window but was not purged; a fresh
        // submit replaces it.
        let mid = cache.submit_at(reading("Mid", 9.0), t0);
        assert_eq!(mid.temperature, 9.0);
    }
}
