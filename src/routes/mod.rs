/// Application routes configuration
use crate::handlers::{
    check_alerts, cleanup_model, clear_history, clear_notifications, compare_cities,
    create_alert, delete_alert, get_daily_forecast, get_hourly_forecast, get_model_stats,
    get_weather, get_weather_by_coords, get_weather_here, health, list_alerts, list_history,
    list_notifications, mark_notification_read, toggle_alert, AppState,
};
use axum::{
    routing::{delete, get, post},
    Router,
};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Current conditions
        .route("/weather", get(get_weather))
        .route("/weather/coords", get(get_weather_by_coords))
        .route("/weather/locate", get(get_weather_here))
        .route("/weather/compare", get(compare_cities))
        // Synthesized forecasts
        .route("/forecast/hourly", get(get_hourly_forecast))
        .route("/forecast/daily", get(get_daily_forecast))
        .route("/model/stats", get(get_model_stats))
        .route("/model/cleanup", post(cleanup_model))
        // Per-user alerts
        .route("/users/:user_id/alerts", get(list_alerts).post(create_alert))
        .route("/users/:user_id/alerts/check", post(check_alerts))
        .route("/users/:user_id/alerts/:alert_id", delete(delete_alert))
        .route("/users/:user_id/alerts/:alert_id/toggle", post(toggle_alert))
        // Notifications
        .route(
            "/users/:user_id/notifications",
            get(list_notifications).delete(clear_notifications),
        )
        .route(
            "/users/:user_id/notifications/:notification_id/read",
            post(mark_notification_read),
        )
        // Search history
        .route(
            "/users/:user_id/history",
            get(list_history).delete(clear_history),
        )
        .with_state(state)
}
