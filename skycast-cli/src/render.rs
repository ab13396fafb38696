//! Plain-text rendering of the dashboard and headlines.

use std::fmt::Write as _;

use chrono::{DateTime, Local, TimeZone, Utc};
use skycast_core::{
    ForecastPoint, WeatherSnapshot, WeatherState,
    model::{round_half_up, unix_to_utc},
    news::Article,
};

pub fn degrees(celsius: f64) -> String {
    format!("{}°", round_half_up(celsius))
}

fn clock<Tz: TimeZone>(ts: i64, tz: &Tz, fmt: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    unix_to_utc(ts)
        .map(|t| t.with_timezone(tz).format(fmt).to_string())
        .unwrap_or_else(|| "--".to_string())
}

pub fn current<Tz: TimeZone>(snapshot: &WeatherSnapshot, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    let category = snapshot.condition.category();

    let _ = writeln!(out, "{}, {}", snapshot.name, snapshot.country);
    let _ = writeln!(
        out,
        "  [{}] {}  {}",
        category.icon_name(),
        degrees(snapshot.temperature_c),
        snapshot.condition.description
    );
    let _ = writeln!(
        out,
        "  Feels like {}   H: {}  L: {}",
        degrees(snapshot.feels_like_c),
        degrees(snapshot.temp_max_c),
        degrees(snapshot.temp_min_c)
    );
    let _ = writeln!(
        out,
        "  Wind {} km/h   Humidity {}%",
        snapshot.wind_speed, snapshot.humidity_pct
    );
    let _ = writeln!(
        out,
        "  Sunrise {}   Sunset {}",
        clock(snapshot.sunrise, tz, "%H:%M"),
        clock(snapshot.sunset, tz, "%H:%M")
    );
    let visibility = snapshot
        .visibility_km()
        .map(|km| format!("{km:.1} km"))
        .unwrap_or_else(|| "--".to_string());
    let _ = writeln!(out, "  Visibility {visibility}   Pressure {} hPa", snapshot.pressure_hpa);

    out
}

pub fn hourly<Tz: TimeZone>(points: &[ForecastPoint], tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::from("Hourly forecast\n");
    for point in points {
        let _ = writeln!(
            out,
            "  {}  [{}] {}",
            clock(point.timestamp, tz, "%H:00"),
            point.condition.category().icon_name(),
            degrees(point.temperature_c)
        );
    }
    out
}

/// Full dashboard in local time. A failed refresh is reported above the
/// data still held.
pub fn dashboard(state: &WeatherState) -> String {
    let mut out = String::new();

    if let Some(message) = state.status.error_message() {
        let _ = writeln!(out, "! {message}");
    }

    match &state.snapshot {
        Some(snapshot) => out.push_str(&current(snapshot, &Local)),
        None => {
            if state.status.is_loading() {
                out.push_str("Fetching latest weather...\n");
            }
            return out;
        }
    }

    if let Some(forecast) = &state.forecast {
        out.push('\n');
        out.push_str(&hourly(forecast.hourly(), &Local));
    }
    out
}

pub fn articles(articles: &[Article]) -> String {
    if articles.is_empty() {
        return "No headlines.\n".to_string();
    }

    let mut out = String::new();
    for article in articles {
        let source = article.source.name.as_deref().unwrap_or("Unknown source");
        let date = article
            .published_at
            .map(|t: DateTime<Utc>| t.with_timezone(&Local).format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        let _ = writeln!(out, "* {}", article.title);
        let _ = writeln!(out, "  {source}  {date}");
        if let Some(description) = &article.description {
            let _ = writeln!(out, "  {description}");
        }
        if let Some(url) = &article.url {
            let _ = writeln!(out, "  {url}");
        }
    }
    out
}
