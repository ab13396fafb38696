use crate::{
    Config, FetchError,
    model::{ForecastSeries, Location, WeatherSnapshot},
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod proxy;

pub use proxy::ProxyProvider;

/// Source of current conditions and forecasts.
///
/// The production implementation talks to the backend proxy; tests can
/// substitute their own.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, location: &Location) -> Result<WeatherSnapshot, FetchError>;

    async fn forecast(&self, location: &Location) -> Result<ForecastSeries, FetchError>;
}

/// Construct the proxy-backed provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let proxy = ProxyProvider::new(config.api_url.as_str()).map_err(|err| {
        anyhow::anyhow!(
            "Failed to build HTTP client for '{}': {err}.\n\
             Hint: run `skycast configure --api-url <url>`.",
            config.api_url
        )
    })?;

    Ok(Arc::new(proxy))
}
