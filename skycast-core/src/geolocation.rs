//! Device position sources.
//!
//! A source hands out watches: a [`WatchId`] plus a stream of position
//! events. Clearing the watch closes the stream.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{Config, LocationError};

/// Acquisition options for a position watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    /// Time allowed for the first fix before the watch reports `Timeout`.
    pub timeout_ms: u64,
    /// Oldest cached position accepted; 0 means always take a fresh fix.
    pub maximum_age_ms: u64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self { enable_high_accuracy: true, timeout_ms: 5_000, maximum_age_ms: 0 }
    }
}

impl PositionOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, accuracy_m: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

pub type PositionEvent = Result<Position, LocationError>;

/// An open watch as returned by [`PositionSource::watch_position`].
#[derive(Debug)]
pub struct PositionWatch {
    pub id: WatchId,
    pub events: mpsc::UnboundedReceiver<PositionEvent>,
}

pub trait PositionSource: Send + Sync + Debug {
    /// Open a continuous watch. Fails immediately when the device cannot
    /// provide positions at all.
    fn watch_position(&self, options: &PositionOptions) -> Result<PositionWatch, LocationError>;

    /// Stop delivering events for `id`. Unknown ids are ignored.
    fn clear_watch(&self, id: WatchId);
}

/// A device with no location support.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPositionSource;

impl PositionSource for UnsupportedPositionSource {
    fn watch_position(&self, _options: &PositionOptions) -> Result<PositionWatch, LocationError> {
        Err(LocationError::Unsupported)
    }

    fn clear_watch(&self, _id: WatchId) {}
}

/// Reports one configured position on every new watch and then stays quiet
/// until the watch is cleared.
#[derive(Debug)]
pub struct FixedPositionSource {
    position: Position,
    next_id: AtomicU64,
    watches: Mutex<HashMap<WatchId, mpsc::UnboundedSender<PositionEvent>>>,
}

impl FixedPositionSource {
    pub fn new(position: Position) -> Self {
        Self { position, next_id: AtomicU64::new(1), watches: Mutex::new(HashMap::new()) }
    }

    pub fn active_watches(&self) -> usize {
        self.watches.lock().len()
    }
}

impl PositionSource for FixedPositionSource {
    fn watch_position(&self, options: &PositionOptions) -> Result<PositionWatch, LocationError> {
        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, events) = mpsc::unbounded_channel();

        debug!(watch = id.0, ?options, "opening fixed position watch");
        // The receiver is alive, so this send cannot fail.
        let _ = tx.send(Ok(self.position));
        self.watches.lock().insert(id, tx);

        Ok(PositionWatch { id, events })
    }

    fn clear_watch(&self, id: WatchId) {
        if self.watches.lock().remove(&id).is_some() {
            debug!(watch = id.0, "cleared fixed position watch");
        }
    }
}

/// Position source for the configured device: a fixed position when one is
/// set, otherwise none at all.
pub fn source_from_config(config: &Config) -> Arc<dyn PositionSource> {
    match config.device {
        Some(device) => Arc::new(FixedPositionSource::new(Position::new(
            device.latitude,
            device.longitude,
        ))),
        None => Arc::new(UnsupportedPositionSource),
    }
}
