//! Synthetic hourly and daily extrapolation from a single reading.
//!
//! This is a display feed, not a meteorological model: a diurnal sine, a
//! couple of slow oscillations and uniform jitter on every channel. Pass a
//! seeded generator to get reproducible output.

use crate::domain::{ForecastDay, ForecastPoint, Reading, Trends};
use crate::utils::round_to;
use chrono::{DateTime, Duration, Timelike, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

const CLEAR: &[&str] = &["clear sky", "few clouds", "scattered clouds"];
const CLOUDS: &[&str] = &["scattered clouds", "broken clouds", "overcast clouds"];
const RAIN: &[&str] = &["light rain", "moderate rain", "heavy rain", "drizzle"];
const SNOW: &[&str] = &["light snow", "moderate snow", "heavy snow"];

pub struct ForecastSynthesizer<R = StdRng> {
    rng: R,
    predictions: u64,
}

impl ForecastSynthesizer<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ForecastSynthesizer<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            predictions: 0,
        }
    }

    /// Number of hourly/daily sequences produced so far
    pub fn prediction_count(&self) -> u64 {
        self.predictions
    }

    pub fn predict_hourly(
        &mut self,
        reading: &Reading,
        hours: u32,
        now: DateTime<Utc>,
    ) -> Vec<ForecastPoint> {
        self.predictions += 1;
        let local_now = now + Duration::seconds(reading.timezone_offset_secs as i64);

        (1..=hours)
            .map(|hour| {
                let hour_of_day = (local_now + Duration::hours(hour as i64)).hour();
                let temp_offset = diurnal_offset(hour_of_day);
                let h = hour as f64;

                let temperature = reading.temperature + temp_offset + self.jitter(1.0);
                let humidity = (reading.humidity - 0.5 * temp_offset + self.jitter(5.0))
                    .clamp(0.0, 100.0);
                let pressure = reading.pressure + 2.0 * (h / 12.0).sin() + self.jitter(2.5);
                let wind_speed =
                    (reading.wind_speed + 1.5 * (h / 6.0).sin() + self.jitter(1.0)).max(0.0);

                let condition = self.condition(temperature, humidity, pressure);
                let precipitation_chance = self.precipitation_chance(humidity, pressure);

                ForecastPoint {
                    hour,
                    time: now + Duration::hours(hour as i64),
                    temperature: round_to(temperature, 1),
                    humidity: humidity.round(),
                    pressure: pressure.round(),
                    wind_speed: round_to(wind_speed, 1),
                    condition,
                    precipitation_chance,
                }
            })
            .collect()
    }

    pub fn predict_daily(
        &mut self,
        reading: &Reading,
        days: u32,
        now: DateTime<Utc>,
    ) -> Vec<ForecastDay> {
        self.predictions += 1;

        (0..days)
            .map(|day| {
                let offset = (day as f64 * PI / 7.0).sin() * 3.0;
                let high = reading.temperature + offset + self.rng.gen_range(0.0..2.0);
                let low = reading.temperature + offset - self.rng.gen_range(0.0..3.0);
                let humidity = (reading.humidity + self.jitter(10.0)).clamp(30.0, 100.0);

                let condition = self.condition(high, humidity, reading.pressure);
                let precipitation_chance = self.precipitation_chance(humidity, reading.pressure);

                ForecastDay {
                    date: (now + Duration::days(day as i64)).date_naive(),
                    high: high.round(),
                    low: low.round(),
                    condition,
                    humidity: humidity.round(),
                    precipitation_chance,
                }
            })
            .collect()
    }

    fn jitter(&mut self, half_width: f64) -> f64 {
        self.rng.gen_range(-half_width..=half_width)
    }

    fn condition(&mut self, temperature: f64, humidity: f64, pressure: f64) -> &'static str {
        let family = condition_family(temperature, humidity, pressure);
        family.choose(&mut self.rng).copied().unwrap_or(family[0])
    }

    fn precipitation_chance(&mut self, humidity: f64, pressure: f64) -> f64 {
        let chance = precipitation_base(humidity, pressure) + self.jitter(10.0);
        chance.clamp(0.0, 100.0).round()
    }
}

/// `amplitude * sin((h - 6) * π / 12)`, amplitude 3 in [06:00, 18:00).
fn diurnal_offset(hour_of_day: u32) -> f64 {
    let amplitude = if (6..18).contains(&hour_of_day) {
        3.0
    } else {
        1.5
    };
    amplitude * ((hour_of_day as f64 - 6.0) * PI / 12.0).sin()
}

fn condition_family(temperature: f64, humidity: f64, pressure: f64) -> &'static [&'static str] {
    if humidity > 80.0 && pressure < 1010.0 {
        RAIN
    } else if humidity > 70.0 && temperature < 5.0 {
        SNOW
    } else if humidity > 60.0 {
        CLOUDS
    } else {
        CLEAR
    }
}

fn precipitation_base(humidity: f64, pressure: f64) -> f64 {
    let mut chance = 0.0;
    if humidity > 80.0 {
        chance += 40.0;
    }
    if pressure < 1010.0 {
        chance += 30.0;
    }
    if humidity > 70.0 && pressure < 1015.0 {
        chance += 20.0;
    }
    chance
}

/// Heuristic trust score for the synthesized series, in [0.8, 1.0].
pub fn confidence(reading: &Reading) -> f64 {
    let mut confidence: f64 = 0.8;
    if reading.visibility.is_some_and(|v| v > 10_000.0) {
        confidence += 0.1;
    }
    if reading.pressure > 1000.0 && reading.pressure < 1020.0 {
        confidence += 0.05;
    }
    if reading.wind_speed < 10.0 {
        confidence += 0.05;
    }
    round_to(confidence.min(1.0), 2)
}

pub fn trends(reading: &Reading) -> Trends {
    Trends {
        temperature_trend: if reading.temperature > 25.0 {
            "warming"
        } else {
            "cooling"
        },
        pressure_trend: if reading.pressure < 1013.0 {
            "falling"
        } else {
            "rising"
        },
        humidity_trend: if reading.humidity > 70.0 {
            "increasing"
        } else {
            "decreasing"
        },
        wind_trend: if reading.wind_speed > 5.0 {
            "strengthening"
        } else {
            "weakening"
        },
    }
}
