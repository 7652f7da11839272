/// Unified error handling module
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Unified error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Every variant renders as a short user-facing sentence. None of them is
/// retried; the caller re-issues the request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("City \"{0}\" not found. Please check the spelling and try again.")]
    NotFound(String),

    #[error("API key error. Please check the weather service configuration.")]
    Auth,

    #[error("Weather service error ({0}). Please try again later.")]
    UpstreamUnavailable(u16),

    #[error("Location access denied. Please allow location access in your browser settings to see your current weather.")]
    GeolocationDenied,

    #[error("Location information is unavailable. Please check your device location settings.")]
    GeolocationUnavailable,

    #[error("Location request timed out. Please try again or search for a city manually.")]
    GeolocationTimeout,

    #[error("Unable to reach the weather service. Please check your connection and try again.")]
    Network(#[source] reqwest::Error),

    #[error("Storage error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    RecordNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Maps a browser geolocation error code (1 denied, 2 unavailable,
    /// 3 timeout) onto the matching error.
    pub fn from_geolocation_code(code: u16) -> Self {
        match code {
            1 => ApiError::GeolocationDenied,
            3 => ApiError::GeolocationTimeout,
            _ => ApiError::GeolocationUnavailable,
        }
    }

    /// Maps a non-success upstream status for a named-location lookup.
    pub fn from_upstream_status(status: u16, location: &str) -> Self {
        match status {
            404 => ApiError::NotFound(location.to_string()),
            401 => ApiError::Auth,
            _ => ApiError::UpstreamUnavailable(status),
        }
    }

    /// Maps a non-success upstream status for a coordinates lookup. There is
    /// no name to report, so 404 counts as the service being unavailable.
    pub fn from_coords_status(status: u16) -> Self {
        match status {
            401 => ApiError::Auth,
            _ => ApiError::UpstreamUnavailable(status),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Auth => "UPSTREAM_AUTH",
            ApiError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            ApiError::GeolocationDenied => "GEO_DENIED",
            ApiError::GeolocationUnavailable => "GEO_UNAVAILABLE",
            ApiError::GeolocationTimeout => "GEO_TIMEOUT",
            ApiError::Network(_) => "NETWORK_ERROR",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::RecordNotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ApiError::UpstreamUnavailable(status.as_u16());
        }
        if err.is_decode() {
            return ApiError::Internal(format!("malformed upstream payload: {}", err));
        }
        ApiError::Network(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("stored value could not be decoded: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_response = ErrorResponse {
            ok: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };

        // Errors travel in the body; the transport status stays 200.
        (StatusCode::OK, Json(error_response)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_mapping() {
        assert!(matches!(
            ApiError::from_upstream_status(404, "Atlantis"),
            ApiError::NotFound(ref c) if c == "Atlantis"
        ));
        assert!(matches!(ApiError::from_upstream_status(401, "x"), ApiError::Auth));
        assert!(matches!(
            ApiError::from_upstream_status(503, "x"),
            ApiError::UpstreamUnavailable(503)
        ));
    }

    #[test]
    fn coords_status_mapping() {
        assert!(matches!(ApiError::from_coords_status(401), ApiError::Auth));
        assert!(matches!(
            ApiError::from_coords_status(404),
            ApiError::UpstreamUnavailable(404)
        ));
        assert!(matches!(
            ApiError::from_coords_status(500),
            ApiError::UpstreamUnavailable(500)
        ));
    }

    #[test]
    fn not_found_message_names_the_city() {
        let err = ApiError::NotFound("Atlantis".into());
        assert_eq!(
            err.to_string(),
            "City \"Atlantis\" not found. Please check the spelling and try again."
        );
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn geolocation_codes() {
        assert_eq!(ApiError::from_geolocation_code(1).code(), "GEO_DENIED");
        assert_eq!(ApiError::from_geolocation_code(2).code(), "GEO_UNAVAILABLE");
        assert_eq!(ApiError::from_geolocation_code(3).code(), "GEO_TIMEOUT");
        assert_eq!(ApiError::from_geolocation_code(9).code(), "GEO_UNAVAILABLE");
    }

    #[test]
    fn upstream_error_message_carries_status() {
        assert_eq!(
            ApiError::UpstreamUnavailable(502).to_string(),
            "Weather service error (502). Please try again later."
        );
    }
}
