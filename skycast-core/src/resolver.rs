//! Decides which location is authoritative.
//!
//! Three sources compete: live device position, a user search and the
//! persisted place from a previous run. The resolver owns at most one device
//! watch; anything that supersedes tracking stops the watch at call time,
//! before its own request goes out. A device fetch already in flight still
//! runs to completion, but is only committed if no search started meanwhile.

use parking_lot::Mutex;
use std::{
    future::Future,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::{
    mpsc,
    oneshot::{self, error::TryRecvError},
};
use tracing::{debug, info, warn};

use crate::{
    LocationError, ResolveError, StorageError,
    config::DEFAULT_PLACE,
    geolocation::{PositionEvent, PositionOptions, PositionSource, PositionWatch, WatchId},
    model::Location,
    storage::{CITY_KEY, KeyValueStore},
    store::WeatherStore,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    pub position: PositionOptions,
    pub default_place: String,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self { position: PositionOptions::default(), default_place: DEFAULT_PLACE.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResolverState {
    #[default]
    Uninitialized,
    /// Waiting on the device for a position.
    Resolving,
    Resolved(Location),
}

/// An active device watch. Dropping it clears the watch and stops delivery;
/// a fetch the delivering task already started is left to finish.
#[derive(Debug)]
pub struct WatchHandle {
    id: WatchId,
    positions: Arc<dyn PositionSource>,
    /// Closing this tells the delivering task to stop.
    _stop: oneshot::Sender<()>,
}

impl WatchHandle {
    pub fn id(&self) -> WatchId {
        self.id
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.positions.clear_watch(self.id);
    }
}

#[derive(Debug)]
pub struct LocationResolver {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: WeatherStore,
    positions: Arc<dyn PositionSource>,
    storage: Arc<dyn KeyValueStore>,
    options: ResolverOptions,
    /// Always a place name; coordinates are never held.
    place: Mutex<Option<String>>,
    state: Mutex<ResolverState>,
    watch: Mutex<Option<WatchHandle>>,
    /// Bumped by every accepted search.
    choice: AtomicU64,
}

impl LocationResolver {
    /// Build a resolver, seeding the held place from storage.
    pub fn new(
        store: WeatherStore,
        positions: Arc<dyn PositionSource>,
        storage: Arc<dyn KeyValueStore>,
        options: ResolverOptions,
    ) -> Self {
        let persisted = storage.get(CITY_KEY).filter(|place| !place.trim().is_empty());
        if let Some(place) = &persisted {
            debug!(%place, "seeded location from storage");
        }

        Self {
            inner: Arc::new(Inner {
                store,
                positions,
                storage,
                options,
                place: Mutex::new(persisted),
                state: Mutex::new(ResolverState::Uninitialized),
                watch: Mutex::new(None),
                choice: AtomicU64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &WeatherStore {
        &self.inner.store
    }

    /// Held location: the last resolved place, or the persisted one.
    pub fn location(&self) -> Option<Location> {
        self.inner.place.lock().clone().map(Location::Place)
    }

    pub fn state(&self) -> ResolverState {
        self.inner.state.lock().clone()
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.watch.lock().is_some()
    }

    pub fn watch_id(&self) -> Option<WatchId> {
        self.inner.watch.lock().as_ref().map(WatchHandle::id)
    }

    /// Follow the device position.
    ///
    /// Any previous watch is cancelled and the new one opened when this is
    /// called; the returned future only matters on failure, where it loads
    /// the fallback place (held place, else the default). Must be called
    /// within a tokio runtime.
    pub fn start_location_tracking(&self) -> impl Future<Output = ()> + Send + use<> {
        let inner = Arc::clone(&self.inner);
        let subscribed = inner.subscribe();

        async move {
            if let Err(err) = subscribed {
                warn!(error = %err, "device location unavailable");
                inner.fall_back().await;
            }
        }
    }

    /// Show weather for a place the user typed.
    ///
    /// Blank input is rejected with no side effects. Otherwise tracking stops
    /// when this is called, not when the future is first polled. On failure
    /// the held location is left as it was.
    pub fn search_location(
        &self,
        place: &str,
    ) -> impl Future<Output = Result<Location, ResolveError>> + Send + use<> {
        let inner = Arc::clone(&self.inner);
        let query = place.trim().to_string();
        let accepted = !query.is_empty();

        if accepted {
            inner.choice.fetch_add(1, Ordering::SeqCst);
            inner.cancel_watch();
            inner.store.mark_loading();
        }

        async move {
            if !accepted {
                debug!("ignoring empty search");
                return Err(ResolveError::EmptyQuery);
            }
            let loaded = inner.load_place(query).await;
            if loaded.is_err() {
                inner.settle_state();
            }
            loaded
        }
    }

    /// Load weather by coordinates and hold the place name the provider
    /// reports for them.
    pub async fn resolve_by_coordinates(&self, lat: f64, lon: f64) -> Result<Location, ResolveError> {
        self.inner.resolve_coordinates(lat, lon).await
    }

    /// Release the device watch, if any. Safe to call repeatedly.
    ///
    /// A position fetch already in flight still completes and commits. If
    /// tracking was only waiting on the device, the store leaves `Loading`
    /// and the resolver goes back to its held place.
    pub fn teardown(&self) {
        if self.inner.cancel_watch() {
            self.inner.store.abandon_loading();
            self.inner.settle_state();
            info!("location tracking stopped");
        }
    }

    /// Drop the held and persisted place.
    pub fn forget_location(&self) -> Result<(), StorageError> {
        self.inner.place.lock().take();
        *self.inner.state.lock() = ResolverState::Uninitialized;
        self.inner.storage.remove(CITY_KEY)
    }
}

impl Inner {
    /// Replace any active watch with a new one.
    fn subscribe(self: &Arc<Self>) -> Result<(), LocationError> {
        let mut slot = self.watch.lock();
        if let Some(previous) = slot.take() {
            debug!(watch = previous.id().0, "replacing location watch");
        }

        *self.state.lock() = ResolverState::Resolving;
        self.store.mark_loading();

        let PositionWatch { id, events } = self.positions.watch_position(&self.options.position)?;
        let (stop_tx, stop) = oneshot::channel();
        tokio::spawn(pump_positions(
            Arc::downgrade(self),
            id,
            events,
            stop,
            self.options.position.timeout(),
        ));

        *slot = Some(WatchHandle { id, positions: Arc::clone(&self.positions), _stop: stop_tx });
        info!(watch = id.0, "location tracking started");
        Ok(())
    }

    fn cancel_watch(&self) -> bool {
        let released = self.watch.lock().take();
        match released {
            Some(handle) => {
                debug!(watch = handle.id().0, "cancelling location watch");
                true
            }
            None => false,
        }
    }

    /// Called from the delivering task when its watch fails. False if the
    /// watch had already been released or replaced.
    fn release_own_watch(&self, id: WatchId) -> bool {
        let mut slot = self.watch.lock();
        if slot.as_ref().map(WatchHandle::id) != Some(id) {
            return false;
        }
        slot.take().is_some()
    }

    /// Leave `Resolving` once nothing is going to resolve: back to the held
    /// place, or uninitialized without one.
    fn settle_state(&self) {
        let mut state = self.state.lock();
        if *state == ResolverState::Resolving {
            *state = match self.place.lock().clone() {
                Some(place) => ResolverState::Resolved(Location::Place(place)),
                None => ResolverState::Uninitialized,
            };
        }
    }

    fn remember(&self, place: &str) {
        *self.place.lock() = Some(place.to_string());
        *self.state.lock() = ResolverState::Resolved(Location::place(place));

        if let Err(err) = self.storage.set(CITY_KEY, place) {
            warn!(error = %err, %place, "failed to persist location");
        }
    }

    async fn load_place(&self, place: String) -> Result<Location, ResolveError> {
        let location = Location::Place(place);
        self.store.load(&location).await?;

        if let Location::Place(place) = &location {
            info!(%place, "location resolved by name");
            self.remember(place);
        }
        Ok(location)
    }

    async fn resolve_coordinates(&self, lat: f64, lon: f64) -> Result<Location, ResolveError> {
        let snapshot = self.store.load(&Location::coordinates(lat, lon)).await?;
        Ok(self.hold_coordinates_name(lat, lon, &snapshot.name))
    }

    /// Device variant: dropped without any write if a search was accepted
    /// after `ticket` was taken.
    async fn resolve_device_position(
        &self,
        lat: f64,
        lon: f64,
        ticket: u64,
    ) -> Result<Location, ResolveError> {
        let still_current = || self.choice.load(Ordering::SeqCst) == ticket;
        let loaded = self.store.load_if(&Location::coordinates(lat, lon), still_current).await;

        match loaded {
            Some(result) => {
                let snapshot = result?;
                Ok(self.hold_coordinates_name(lat, lon, &snapshot.name))
            }
            None => Err(ResolveError::Superseded),
        }
    }

    fn hold_coordinates_name(&self, lat: f64, lon: f64, name: &str) -> Location {
        info!(lat, lon, place = %name, "location resolved from coordinates");
        self.remember(name);
        Location::place(name)
    }

    async fn fall_back(&self) {
        let held = self.place.lock().clone();
        let place = held.unwrap_or_else(|| self.options.default_place.clone());

        info!(%place, "falling back to saved location");
        if let Err(err) = self.load_place(place).await {
            warn!(error = %err, "fallback location failed to load");
            self.settle_state();
        }
    }
}

/// Feed device positions into the resolver until the watch ends.
///
/// The first fix has to arrive within `timeout`. Any error from the device
/// ends the watch and loads the fallback place. Once `stop` closes no new
/// event is taken, but a fetch already running is awaited to its end.
async fn pump_positions(
    inner: Weak<Inner>,
    id: WatchId,
    mut events: mpsc::UnboundedReceiver<PositionEvent>,
    mut stop: oneshot::Receiver<()>,
    timeout: Duration,
) {
    let mut first_fix = Some(timeout);

    loop {
        let next = async {
            match first_fix.take() {
                Some(timeout) => tokio::time::timeout(timeout, events.recv())
                    .await
                    .unwrap_or(Some(Err(LocationError::Timeout))),
                None => events.recv().await,
            }
        };

        let event = tokio::select! {
            biased;
            _ = &mut stop => {
                debug!(watch = id.0, "watch released");
                break;
            }
            event = next => event,
        };

        let Some(event) = event else {
            debug!(watch = id.0, "position stream closed");
            break;
        };
        if !matches!(stop.try_recv(), Err(TryRecvError::Empty)) {
            debug!(watch = id.0, "watch released");
            break;
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };

        match event {
            Ok(position) => {
                debug!(watch = id.0, ?position, "position update");
                let ticket = inner.choice.load(Ordering::SeqCst);
                if let Err(err) =
                    inner.resolve_device_position(position.latitude, position.longitude, ticket).await
                {
                    debug!(error = %err, "position update did not resolve");
                }
            }
            Err(err) => {
                warn!(watch = id.0, error = %err, "device location failed");
                if inner.release_own_watch(id) {
                    inner.fall_back().await;
                }
                break;
            }
        }
    }
}
