//! Core library for the SkyCast weather dashboard.
//!
//! This crate defines:
//! - Location resolution across device position, user search and saved state
//! - The weather store shared by rendering surfaces
//! - The backend proxy client (weather, forecast, news)
//! - Configuration, persisted preferences and the scripted assistant
//!
//! It is used by `skycast-cli`, but can also be reused by other front ends.

pub mod assistant;
pub mod config;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod news;
pub mod provider;
pub mod resolver;
pub mod settings;
pub mod storage;
pub mod store;

pub use config::{Config, DevicePosition};
pub use error::{FetchError, LocationError, ResolveError, StorageError};
pub use geolocation::{Position, PositionOptions, PositionSource, WatchId};
pub use model::{
    ConditionCategory, FetchStatus, ForecastPoint, ForecastSeries, Location, WeatherSnapshot,
};
pub use provider::{ProxyProvider, WeatherProvider};
pub use resolver::{LocationResolver, ResolverOptions, ResolverState};
pub use settings::{Settings, Theme};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use store::{WeatherState, WeatherStore};
