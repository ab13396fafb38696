//! Shared fixtures for the proxy-backed integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use skycast_core::{
    LocationError, LocationResolver, MemoryStorage, Position, PositionOptions, PositionSource,
    ProxyProvider, ResolverOptions, WatchId, WeatherStore,
    geolocation::{PositionEvent, PositionWatch},
};
use tokio::sync::mpsc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

/// Current-conditions body in the upstream shape.
pub fn current_body(name: &str, temp: f64, code: u16, description: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "visibility": 10000,
        "main": {
            "temp": temp, "feels_like": temp - 1.0, "temp_min": temp - 2.0,
            "temp_max": temp + 2.0, "humidity": 65, "pressure": 1013
        },
        "wind": {"speed": 3.6},
        "weather": [{"id": code, "main": "", "description": description}],
        "sys": {"country": "XX", "sunrise": 1_700_000_000, "sunset": 1_700_030_000}
    })
}

/// Forecast body with `points` three-hourly entries.
pub fn forecast_body(points: usize) -> serde_json::Value {
    let list: Vec<serde_json::Value> = (0..points)
        .map(|i| {
            serde_json::json!({
                "dt": 1_700_000_000 + (i as i64) * 10_800,
                "main": {"temp": 10.0 + i as f64, "feels_like": 9.0, "temp_min": 8.0,
                         "temp_max": 12.0, "humidity": 70, "pressure": 1012},
                "weather": [{"id": 801, "description": "few clouds"}]
            })
        })
        .collect();
    serde_json::json!({"cod": "200", "cnt": points, "list": list})
}

/// Serve weather and forecast for `city`, optionally delaying both.
pub async fn mount_city(server: &MockServer, city: &str, delay: Option<Duration>) {
    let mut current = ResponseTemplate::new(200).set_body_json(current_body(city, 18.0, 800, "clear sky"));
    let mut forecast = ResponseTemplate::new(200).set_body_json(forecast_body(40));
    if let Some(delay) = delay {
        current = current.set_delay(delay);
        forecast = forecast.set_delay(delay);
    }

    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .and(query_param("city", city))
        .respond_with(current)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/forecast"))
        .and(query_param("city", city))
        .respond_with(forecast)
        .mount(server)
        .await;
}

/// Serve coordinate lookups that resolve to `name`.
pub async fn mount_coordinates(
    server: &MockServer,
    lat: &str,
    lon: &str,
    name: &str,
    delay: Option<Duration>,
) {
    let mut current = ResponseTemplate::new(200).set_body_json(current_body(name, 11.0, 500, "light rain"));
    let mut forecast = ResponseTemplate::new(200).set_body_json(forecast_body(40));
    if let Some(delay) = delay {
        current = current.set_delay(delay);
        forecast = forecast.set_delay(delay);
    }

    for (route, template) in [("/api/weather", current), ("/api/forecast", forecast)] {
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("lat", lat))
            .and(query_param("lon", lon))
            .respond_with(template)
            .mount(server)
            .await;
    }
}

/// Any request for `city` fails with `status` and the given JSON body.
pub async fn mount_failure(server: &MockServer, city: &str, status: u16, body: serde_json::Value) {
    for route in ["/api/weather", "/api/forecast"] {
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("city", city))
            .respond_with(ResponseTemplate::new(status).set_body_json(body.clone()))
            .mount(server)
            .await;
    }
}

pub fn store_for(server: &MockServer) -> WeatherStore {
    let proxy = ProxyProvider::new(format!("{}/api", server.uri())).expect("client builds");
    WeatherStore::new(Arc::new(proxy))
}

pub fn resolver_for(
    server: &MockServer,
    positions: Arc<dyn PositionSource>,
    storage: Arc<MemoryStorage>,
) -> LocationResolver {
    resolver_with_options(server, positions, storage, ResolverOptions::default())
}

pub fn resolver_with_options(
    server: &MockServer,
    positions: Arc<dyn PositionSource>,
    storage: Arc<MemoryStorage>,
    options: ResolverOptions,
) -> LocationResolver {
    LocationResolver::new(store_for(server), positions, storage, options)
}

/// Position source driven by the test: events are pushed by hand.
#[derive(Debug)]
pub struct ManualPositionSource {
    refuse: Option<LocationError>,
    next_id: AtomicU64,
    watches: Mutex<HashMap<WatchId, mpsc::UnboundedSender<PositionEvent>>>,
    cleared: Mutex<Vec<WatchId>>,
}

impl ManualPositionSource {
    pub fn new() -> Self {
        Self {
            refuse: None,
            next_id: AtomicU64::new(1),
            watches: Mutex::new(HashMap::new()),
            cleared: Mutex::new(Vec::new()),
        }
    }

    /// A device that refuses every watch with `err`.
    pub fn refusing(err: LocationError) -> Self {
        Self { refuse: Some(err), ..Self::new() }
    }

    /// Deliver to every open watch; returns how many received it.
    pub fn push(&self, event: PositionEvent) -> usize {
        self.watches.lock().values().filter(|tx| tx.send(event.clone()).is_ok()).count()
    }

    pub fn push_position(&self, lat: f64, lon: f64) -> usize {
        self.push(Ok(Position::new(lat, lon)))
    }

    pub fn active_watches(&self) -> usize {
        self.watches.lock().len()
    }

    pub fn cleared(&self) -> Vec<WatchId> {
        self.cleared.lock().clone()
    }
}

impl PositionSource for ManualPositionSource {
    fn watch_position(&self, _options: &PositionOptions) -> Result<PositionWatch, LocationError> {
        if let Some(err) = &self.refuse {
            return Err(err.clone());
        }
        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, events) = mpsc::unbounded_channel();
        self.watches.lock().insert(id, tx);
        Ok(PositionWatch { id, events })
    }

    fn clear_watch(&self, id: WatchId) {
        if self.watches.lock().remove(&id).is_some() {
            self.cleared.lock().push(id);
        }
    }
}

/// Give spawned tasks a moment to pick up pushed events.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
