/// Core weather engines: reading dedup, forecast synthesis, alert evaluation
pub mod alerts;
pub mod cache;
pub mod debounce;
pub mod forecast;

pub use alerts::evaluate;
pub use cache::WeatherCache;
pub use debounce::Debouncer;
pub use forecast::ForecastSynthesizer;
