/// External API clients module
use crate::config::NotificationPermission;
use crate::domain::{GeoFix, Reading};
use crate::errors::{ApiError, ApiResult};
use crate::utils::{at_path, num_at, str_at, unix_at};
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP client wrapper with common configuration
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("weather-dash/1.0")
            .build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

/// Current-conditions client for an OpenWeather-compatible API
pub struct WeatherClient {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
}

impl WeatherClient {
    pub fn new(base_url: String, api_key: String) -> ApiResult<Self> {
        Ok(Self {
            http_client: HttpClient::new()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Fetch current weather by city name
    pub async fn fetch_by_city(&self, city: &str) -> ApiResult<Reading> {
        let url = format!("{}/weather", self.base_url);
        let resp = self
            .http_client
            .get_client()
            .get(&url)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!("Weather lookup for {} failed with status {}", city, status);
            return Err(ApiError::from_upstream_status(status.as_u16(), city));
        }

        let json: Value = resp.json().await?;
        parse_current(&json)
    }

    /// Fetch current weather by coordinates
    pub async fn fetch_by_coords(&self, lat: f64, lon: f64) -> ApiResult<Reading> {
        let url = format!("{}/weather", self.base_url);
        let resp = self
            .http_client
            .get_client()
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                "Weather lookup for ({}, {}) failed with status {}",
                lat, lon, status
            );
            return Err(ApiError::from_coords_status(status.as_u16()));
        }

        let json: Value = resp.json().await?;
        parse_current(&json)
    }
}

/// Extract a Reading from a current-weather payload. Open-water coordinates
/// come back with an empty name, which is kept as is.
pub fn parse_current(json: &Value) -> ApiResult<Reading> {
    let malformed = |field: &str| ApiError::Internal(format!("weather payload missing {}", field));

    let name = at_path(json, "name")
        .and_then(Value::as_str)
        .map(|n| n.trim().to_string())
        .ok_or_else(|| malformed("name"))?;
    let temperature = num_at(json, "main.temp").ok_or_else(|| malformed("main.temp"))?;
    let humidity = num_at(json, "main.humidity").ok_or_else(|| malformed("main.humidity"))?;
    let pressure = num_at(json, "main.pressure").ok_or_else(|| malformed("main.pressure"))?;
    let wind_speed = num_at(json, "wind.speed").ok_or_else(|| malformed("wind.speed"))?;

    Ok(Reading {
        name,
        country: str_at(json, "sys.country").unwrap_or_default(),
        temperature,
        feels_like: num_at(json, "main.feels_like"),
        humidity,
        pressure,
        wind_speed,
        visibility: num_at(json, "visibility"),
        description: str_at(json, "weather.0.description").unwrap_or_default(),
        observed_at: unix_at(json, "dt").unwrap_or_else(Utc::now),
        lat: num_at(json, "coord.lat"),
        lon: num_at(json, "coord.lon"),
        timezone_offset_secs: num_at(json, "timezone").map(|t| t as i32).unwrap_or(0),
        sunrise: unix_at(json, "sys.sunrise"),
        sunset: unix_at(json, "sys.sunset"),
    })
}

/// One-shot IP geolocation lookup
pub struct GeoClient {
    http_client: HttpClient,
    url: String,
    enabled: bool,
    timeout: Duration,
}

impl GeoClient {
    pub fn new(url: String, enabled: bool, timeout: Duration) -> ApiResult<Self> {
        Ok(Self {
            http_client: HttpClient::new()?,
            url,
            enabled,
            timeout,
        })
    }

    /// Resolve the caller's position. Disabled lookups count as a denied
    /// permission; an elapsed timeout is surfaced as its own error.
    pub async fn locate(&self) -> ApiResult<GeoFix> {
        if !self.enabled {
            return Err(ApiError::GeolocationDenied);
        }

        // The bound covers the body read as well as the request.
        let lookup = async {
            let resp = self.http_client.get_client().get(&self.url).send().await?;
            if !resp.status().is_success() {
                return Ok(None);
            }
            resp.json::<Value>().await.map(Some)
        };
        let json = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| ApiError::GeolocationTimeout)?
            .map_err(|e| {
                warn!("Geolocation request failed: {}", e);
                ApiError::GeolocationUnavailable
            })?
            .ok_or(ApiError::GeolocationUnavailable)?;
        let fix = parse_geo(&json)?;
        debug!("Geolocated caller at ({}, {})", fix.lat, fix.lon);
        Ok(fix)
    }
}

fn parse_geo(json: &Value) -> ApiResult<GeoFix> {
    if let Some(status) = str_at(json, "status") {
        if status != "success" {
            return Err(ApiError::GeolocationUnavailable);
        }
    }
    let lat = num_at(json, "lat").or_else(|| num_at(json, "latitude"));
    let lon = num_at(json, "lon").or_else(|| num_at(json, "longitude"));
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(GeoFix { lat, lon }),
        _ => Err(ApiError::GeolocationUnavailable),
    }
}

/// Fire-and-forget alert display. Only dispatches when permission was
/// granted and a webhook target exists; failures are logged, never returned.
#[derive(Clone)]
pub struct NotificationDispatcher {
    http_client: HttpClient,
    permission: NotificationPermission,
    webhook_url: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(
        permission: NotificationPermission,
        webhook_url: Option<String>,
    ) -> ApiResult<Self> {
        Ok(Self {
            http_client: HttpClient::new()?,
            permission,
            webhook_url,
        })
    }

    pub fn can_display(&self) -> bool {
        self.permission == NotificationPermission::Granted && self.webhook_url.is_some()
    }

    pub fn display(&self, body: &str) {
        if !self.can_display() {
            return;
        }
        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available to display alert notification");
            return;
        };
        let client = self.http_client.get_client().clone();
        let payload = serde_json::json!({
            "title": "Weather Alert",
            "body": body,
        });

        runtime.spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("Alert notification delivered");
                }
                Ok(resp) => warn!("Alert notification rejected with status {}", resp.status()),
                Err(e) => warn!("Alert notification failed: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers every connection with `response`. With `hold` the socket is
    /// left open afterwards.
    async fn serve_raw(response: String, hold: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = response.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    if hold {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                });
            }
        });
        format!("http://{}", addr)
    }

    fn http_response(status: u16, body: &str) -> String {
        format!(
            "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    async fn client_for(status: u16, body: &str) -> WeatherClient {
        let base = serve_raw(http_response(status, body), false).await;
        WeatherClient::new(base, "key".into()).unwrap()
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        let client = WeatherClient::new("http://127.0.0.1:9".into(), "key".into()).unwrap();
        let by_city = client.fetch_by_city("London").await.unwrap_err();
        let by_coords = client.fetch_by_coords(51.5, -0.1).await.unwrap_err();
        assert_eq!(by_city.code(), "NETWORK_ERROR");
        assert_eq!(by_coords.code(), "NETWORK_ERROR");
    }

    #[tokio::test]
    async fn upstream_statuses_map_per_lookup_kind() {
        let cases = [
            (401, "UPSTREAM_AUTH", "UPSTREAM_AUTH"),
            (404, "NOT_FOUND", "UPSTREAM_UNAVAILABLE"),
            (503, "UPSTREAM_UNAVAILABLE", "UPSTREAM_UNAVAILABLE"),
        ];
        for (status, city_code, coords_code) in cases {
            let client = client_for(status, "{}").await;
            let by_city = client.fetch_by_city("Atlantis").await.unwrap_err();
            let by_coords = client.fetch_by_coords(0.0, 0.0).await.unwrap_err();
            assert_eq!(by_city.code(), city_code, "status {status}");
            assert_eq!(by_coords.code(), coords_code, "status {status}");
        }

        let client = client_for(404, "{}").await;
        let err = client.fetch_by_city("Atlantis").await.unwrap_err();
        assert!(err.to_string().contains("\"Atlantis\""));
    }

    #[tokio::test]
    async fn open_water_reading_has_empty_name() {
        let body = serde_json::json!({
            "coord": {"lon": -40.0, "lat": 30.0},
            "weather": [{"description": "clear sky"}],
            "main": {"temp": 21.0, "humidity": 70, "pressure": 1020},
            "wind": {"speed": 6.1},
            "sys": {},
            "name": ""
        })
        .to_string();
        let client = client_for(200, &body).await;

        let r = client.fetch_by_coords(30.0, -40.0).await.unwrap();
        assert_eq!(r.name, "");
        assert_eq!(r.lat, Some(30.0));
        assert_eq!(r.temperature, 21.0);
    }

    #[tokio::test]
    async fn geolocation_timeout_covers_body_read() {
        // Headers arrive at once but the promised body never does.
        let stalled = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{";
        let url = serve_raw(stalled.to_string(), true).await;
        let client = GeoClient::new(url, true, Duration::from_millis(200)).unwrap();
        assert_eq!(client.locate().await.unwrap_err().code(), "GEO_TIMEOUT");
    }

    #[tokio::test]
    async fn geolocation_lookup_resolves_fix() {
        let body = r#"{"status": "success", "lat": 48.85, "lon": 2.35}"#;
        let url = serve_raw(http_response(200, body), false).await;
        let client = GeoClient::new(url, true, Duration::from_secs(15)).unwrap();
        assert_eq!(client.locate().await.unwrap(), GeoFix { lat: 48.85, lon: 2.35 });
    }

    #[test]
    fn parses_openweather_payload() {
        let json = serde_json::json!({
            "coord": {"lon": -0.1257, "lat": 51.5085},
            "weather": [{"main": "Clouds", "description": "broken clouds", "icon": "04d"}],
            "main": {"temp": 14.2, "feels_like": 13.5, "humidity": 72, "pressure": 1011},
            "visibility": 10000,
            "wind": {"speed": 4.6},
            "dt": 1705315800,
            "sys": {"country": "GB", "sunrise": 1705305000, "sunset": 1705335000},
            "timezone": 0,
            "name": "London"
        });

        let r = parse_current(&json).unwrap();
        assert_eq!(r.name, "London");
        assert_eq!(r.country, "GB");
        assert_eq!(r.temperature, 14.2);
        assert_eq!(r.feels_like, Some(13.5));
        assert_eq!(r.humidity, 72.0);
        assert_eq!(r.pressure, 1011.0);
        assert_eq!(r.wind_speed, 4.6);
        assert_eq!(r.visibility, Some(10000.0));
        assert_eq!(r.description, "broken clouds");
        assert_eq!(r.observed_at.timestamp(), 1705315800);
        assert_eq!(r.lat, Some(51.5085));
        assert!(r.sunrise.is_some());
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let json = serde_json::json!({
            "main": {"temp": 1.0, "humidity": 90, "pressure": 1000},
            "wind": {"speed": 0.5},
            "weather": [],
            "name": "Nowhere"
        });
        let r = parse_current(&json).unwrap();
        assert_eq!(r.visibility, None);
        assert_eq!(r.country, "");
        assert_eq!(r.description, "");
        assert_eq!(r.timezone_offset_secs, 0);
    }

    #[test]
    fn empty_name_is_kept_but_missing_name_is_not() {
        let json = serde_json::json!({
            "main": {"temp": 1.0, "humidity": 90, "pressure": 1000},
            "wind": {"speed": 0.5},
            "name": ""
        });
        assert_eq!(parse_current(&json).unwrap().name, "");

        let json = serde_json::json!({
            "main": {"temp": 1.0, "humidity": 90, "pressure": 1000},
            "wind": {"speed": 0.5}
        });
        assert_eq!(parse_current(&json).unwrap_err().code(), "INTERNAL_ERROR");
    }

    #[test]
    fn missing_core_field_is_internal_error() {
        let json = serde_json::json!({"name": "X", "main": {"temp": 1.0}});
        let err = parse_current(&json).unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn geo_payloads() {
        let ok = serde_json::json!({"status": "success", "lat": 40.7, "lon": -74.0});
        assert_eq!(parse_geo(&ok).unwrap(), GeoFix { lat: 40.7, lon: -74.0 });

        let failed = serde_json::json!({"status": "fail", "message": "private range"});
        assert_eq!(parse_geo(&failed).unwrap_err().code(), "GEO_UNAVAILABLE");
    }

    #[tokio::test]
    async fn disabled_geolocation_is_denied() {
        let client = GeoClient::new(
            "http://127.0.0.1:9".into(),
            false,
            Duration::from_secs(15),
        )
        .unwrap();
        assert_eq!(client.locate().await.unwrap_err().code(), "GEO_DENIED");
    }

    #[test]
    fn dispatcher_requires_granted_permission_and_target() {
        let denied = NotificationDispatcher::new(
            NotificationPermission::Denied,
            Some("http://localhost/hook".into()),
        )
        .unwrap();
        assert!(!denied.can_display());

        let no_target = NotificationDispatcher::new(NotificationPermission::Granted, None).unwrap();
        assert!(!no_target.can_display());
        // Must be a silent no-op without a runtime or target.
        no_target.display("ignored");

        let granted = NotificationDispatcher::new(
            NotificationPermission::Granted,
            Some("http://localhost/hook".into()),
        )
        .unwrap();
        assert!(granted.can_display());
    }
}
