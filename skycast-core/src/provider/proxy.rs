use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::{
    FetchError,
    model::{ForecastSeries, Location, WeatherSnapshot},
};

use super::WeatherProvider;

const REQUEST_TIMEOUT_SECS: u64 = 15;
const USER_AGENT: &str = concat!("skycast/", env!("CARGO_PKG_VERSION"));

/// Client for the SkyCast backend proxy (`/weather`, `/forecast`, `/news`).
#[derive(Debug, Clone)]
pub struct ProxyProvider {
    base_url: String,
    http: Client,
}

impl ProxyProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base}/{endpoint}` and decode the body. Any non-2xx is a failure.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        what: &'static str,
    ) -> Result<T, FetchError> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, ?query, "requesting {what}");

        let res = self.http.get(&url).query(query).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            debug!(%status, body = %truncate_body(&body), "{what} request failed");
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| FetchError::Decode { what, source })
    }
}

#[async_trait]
impl WeatherProvider for ProxyProvider {
    async fn current(&self, location: &Location) -> Result<WeatherSnapshot, FetchError> {
        self.get_json("weather", &location_query(location), "weather").await
    }

    async fn forecast(&self, location: &Location) -> Result<ForecastSeries, FetchError> {
        self.get_json("forecast", &location_query(location), "forecast").await
    }
}

/// Query string for either form of location.
pub(crate) fn location_query(location: &Location) -> Vec<(&'static str, String)> {
    match location {
        Location::Place(name) => vec![("city", name.clone())],
        Location::Coordinates { lat, lon } => {
            vec![("lat", lat.to_string()), ("lon", lon.to_string())]
        }
    }
}

/// Pull `error` (proxy) or `message` (upstream passthrough) from an error body.
pub(crate) fn upstream_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    ["error", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .filter(|msg| !msg.trim().is_empty())
        .map(str::to_string)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
