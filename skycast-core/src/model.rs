use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// Number of forecast points the dashboard shows as the "hourly" strip.
pub const HOURLY_POINTS: usize = 8;

/// The place weather is requested for.
///
/// Only the `Place` form is ever persisted: coordinates are resolved to the
/// provider's place name first.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Place(String),
    Coordinates { lat: f64, lon: f64 },
}

impl Location {
    pub fn place(name: impl Into<String>) -> Self {
        Location::Place(name.into())
    }

    pub fn coordinates(lat: f64, lon: f64) -> Self {
        Location::Coordinates { lat, lon }
    }

    pub fn place_name(&self) -> Option<&str> {
        match self {
            Location::Place(name) => Some(name),
            Location::Coordinates { .. } => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Place(name) => f.write_str(name),
            Location::Coordinates { lat, lon } => write!(f, "{lat:.4}, {lon:.4}"),
        }
    }
}

/// Provider-defined weather condition (`weather[0]` in the upstream payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub code: u16,
    pub description: String,
}

impl Condition {
    pub fn unknown() -> Self {
        Self { code: 0, description: "unknown".to_string() }
    }

    pub fn category(&self) -> ConditionCategory {
        ConditionCategory::from_code(self.code)
    }
}

/// Condition code ranges as defined by the upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionCategory {
    Thunderstorm,
    Drizzle,
    Rain,
    Snow,
    Atmosphere,
    Clear,
    Clouds,
    Unknown,
}

impl ConditionCategory {
    pub fn from_code(code: u16) -> Self {
        match code {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            500..=599 => Self::Rain,
            600..=699 => Self::Snow,
            700..=799 => Self::Atmosphere,
            800 => Self::Clear,
            801..=899 => Self::Clouds,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Thunderstorm => "Thunderstorm",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Atmosphere => "Haze",
            Self::Clear => "Clear",
            Self::Clouds => "Clouds",
            Self::Unknown => "Unknown",
        }
    }

    /// Icon shown on the dashboard. Drizzle and rain share one.
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Thunderstorm => "cloud_lightning",
            Self::Drizzle | Self::Rain => "cloud_rain",
            Self::Snow => "cloud_snow",
            Self::Clear => "sun",
            Self::Atmosphere | Self::Clouds | Self::Unknown => "cloud",
        }
    }
}

/// Current conditions for one place at one point in time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "OwCurrentResponse")]
pub struct WeatherSnapshot {
    pub name: String,
    pub country: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: u32,
    pub wind_speed: f64,
    pub visibility_m: Option<u32>,
    /// Epoch seconds.
    pub sunrise: i64,
    /// Epoch seconds.
    pub sunset: i64,
    pub condition: Condition,
}

impl WeatherSnapshot {
    pub fn sunrise_utc(&self) -> Option<DateTime<Utc>> {
        unix_to_utc(self.sunrise)
    }

    pub fn sunset_utc(&self) -> Option<DateTime<Utc>> {
        unix_to_utc(self.sunset)
    }

    pub fn visibility_km(&self) -> Option<f64> {
        self.visibility_m.map(|m| f64::from(m) / 1000.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    /// Epoch seconds.
    pub timestamp: i64,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub humidity_pct: u8,
    pub condition: Condition,
}

impl ForecastPoint {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        unix_to_utc(self.timestamp)
    }
}

/// Time-ordered forecast points as returned by the provider.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "OwForecastResponse")]
pub struct ForecastSeries {
    pub points: Vec<ForecastPoint>,
}

impl ForecastSeries {
    /// Leading points shown in the hourly strip.
    pub fn hourly(&self) -> &[ForecastPoint] {
        let end = self.points.len().min(HOURLY_POINTS);
        &self.points[..end]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Lifecycle of the most recent fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error(String),
}

impl FetchStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchStatus::Loading)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            FetchStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

pub fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Whole degrees as the dashboard shows them. Halves round towards positive
/// infinity, so -2.5 becomes -2.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: u8,
    #[serde(default)]
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u16,
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: String,
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    visibility: Option<u32>,
    #[serde(default)]
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    list: Vec<OwForecastEntry>,
}

fn first_condition(weather: Vec<OwWeather>) -> Condition {
    weather
        .into_iter()
        .next()
        .map(|w| Condition { code: w.id, description: w.description })
        .unwrap_or_else(Condition::unknown)
}

impl From<OwCurrentResponse> for WeatherSnapshot {
    fn from(raw: OwCurrentResponse) -> Self {
        Self {
            name: raw.name,
            country: raw.sys.country,
            temperature_c: raw.main.temp,
            feels_like_c: raw.main.feels_like,
            temp_min_c: raw.main.temp_min,
            temp_max_c: raw.main.temp_max,
            humidity_pct: raw.main.humidity,
            pressure_hpa: raw.main.pressure,
            wind_speed: raw.wind.speed,
            visibility_m: raw.visibility,
            sunrise: raw.sys.sunrise,
            sunset: raw.sys.sunset,
            condition: first_condition(raw.weather),
        }
    }
}

impl From<OwForecastResponse> for ForecastSeries {
    fn from(raw: OwForecastResponse) -> Self {
        let points = raw
            .list
            .into_iter()
            .map(|entry| ForecastPoint {
                timestamp: entry.dt,
                temperature_c: entry.main.temp,
                feels_like_c: entry.main.feels_like,
                temp_min_c: entry.main.temp_min,
                temp_max_c: entry.main.temp_max,
                humidity_pct: entry.main.humidity,
                condition: first_condition(entry.weather),
            })
            .collect();

        Self { points }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONDON: &str = r#"{
        "name": "London",
        "visibility": 10000,
        "main": {"temp": 12.4, "feels_like": 11.0, "temp_min": 10.1, "temp_max": 13.9,
                 "humidity": 81, "pressure": 1012},
        "wind": {"speed": 4.6},
        "weather": [{"id": 500, "main": "Rain", "description": "light rain"}],
        "sys": {"country": "GB", "sunrise": 1700000000, "sunset": 1700030000}
    }"#;

    #[test]
    fn snapshot_flattens_upstream_payload() {
        let snapshot: WeatherSnapshot = serde_json::from_str(LONDON).expect("valid payload");

        assert_eq!(snapshot.name, "London");
        assert_eq!(snapshot.country, "GB");
        assert_eq!(snapshot.pressure_hpa, 1012);
        assert_eq!(snapshot.humidity_pct, 81);
        assert_eq!(snapshot.visibility_km(), Some(10.0));
        assert_eq!(snapshot.condition.code, 500);
        assert_eq!(snapshot.condition.category(), ConditionCategory::Rain);
        assert_eq!(snapshot.sunrise_utc().map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn snapshot_without_weather_entry_is_unknown() {
        let json = r#"{"name": "Nowhere",
            "main": {"temp": 1.0, "feels_like": 1.0, "temp_min": 1.0, "temp_max": 1.0, "humidity": 5}}"#;
        let snapshot: WeatherSnapshot = serde_json::from_str(json).expect("valid payload");

        assert_eq!(snapshot.condition, Condition::unknown());
        assert_eq!(snapshot.visibility_m, None);
        assert_eq!(snapshot.country, "");
    }

    #[test]
    fn forecast_keeps_order_and_limits_hourly_strip() {
        let entries: Vec<String> = (0..10)
            .map(|i| {
                format!(
                    r#"{{"dt": {}, "main": {{"temp": {i}.0, "feels_like": 0.0, "temp_min": 0.0,
                        "temp_max": 0.0, "humidity": 50}}, "weather": [{{"id": 800, "description": "clear sky"}}]}}"#,
                    1_700_000_000 + i * 10_800
                )
            })
            .collect();
        let json = format!(r#"{{"cnt": 10, "list": [{}]}}"#, entries.join(","));

        let forecast: ForecastSeries = serde_json::from_str(&json).expect("valid payload");

        assert_eq!(forecast.len(), 10);
        assert_eq!(forecast.hourly().len(), HOURLY_POINTS);
        assert_eq!(forecast.hourly()[3].temperature_c, 3.0);
        assert!(forecast.points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn condition_ranges() {
        assert_eq!(ConditionCategory::from_code(211), ConditionCategory::Thunderstorm);
        assert_eq!(ConditionCategory::from_code(301), ConditionCategory::Drizzle);
        assert_eq!(ConditionCategory::from_code(502), ConditionCategory::Rain);
        assert_eq!(ConditionCategory::from_code(601), ConditionCategory::Snow);
        assert_eq!(ConditionCategory::from_code(741), ConditionCategory::Atmosphere);
        assert_eq!(ConditionCategory::from_code(800), ConditionCategory::Clear);
        assert_eq!(ConditionCategory::from_code(804), ConditionCategory::Clouds);
        assert_eq!(ConditionCategory::from_code(450), ConditionCategory::Unknown);
    }

    #[test]
    fn drizzle_and_rain_share_icon() {
        assert_eq!(ConditionCategory::Drizzle.icon_name(), ConditionCategory::Rain.icon_name());
        assert_eq!(ConditionCategory::Clear.icon_name(), "sun");
    }

    #[test]
    fn location_display() {
        assert_eq!(Location::place("Paris").to_string(), "Paris");
        assert_eq!(Location::coordinates(51.5, -0.12).to_string(), "51.5000, -0.1200");
        assert_eq!(Location::coordinates(1.0, 2.0).place_name(), None);
    }

    #[test]
    fn fetch_status_helpers() {
        assert!(FetchStatus::Loading.is_loading());
        assert!(!FetchStatus::default().is_loading());
        assert_eq!(FetchStatus::Error("boom".into()).error_message(), Some("boom"));
        assert_eq!(FetchStatus::Ready.error_message(), None);
    }

    #[test]
    fn halves_round_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.4), 2);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-2.6), -3);
    }
}
