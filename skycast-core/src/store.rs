//! Weather state shared by every rendering surface.
//!
//! The store is a cheap handle: clones observe and mutate the same state.
//! Readers either take a copy with [`WeatherStore::state`] or subscribe for
//! change notifications.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    FetchError,
    model::{FetchStatus, ForecastSeries, Location, WeatherSnapshot},
    provider::WeatherProvider,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherState {
    pub snapshot: Option<Arc<WeatherSnapshot>>,
    pub forecast: Option<Arc<ForecastSeries>>,
    pub status: FetchStatus,
}

#[derive(Debug, Clone)]
pub struct WeatherStore {
    provider: Arc<dyn WeatherProvider>,
    state: Arc<watch::Sender<WeatherState>>,
    ledger: Arc<Mutex<Ledger>>,
}

/// Bookkeeping behind the published state. Taken inside the watch channel's
/// write lock, never the other way round.
#[derive(Debug, Default)]
struct Ledger {
    in_flight: usize,
    /// Status set by the last commit.
    settled: FetchStatus,
}

/// Counts one fetch as in flight until dropped, committed or not.
struct InFlight(Arc<Mutex<Ledger>>);

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut ledger = self.0.lock();
        ledger.in_flight = ledger.in_flight.saturating_sub(1);
    }
}

type Fetched = Result<(Arc<WeatherSnapshot>, Arc<ForecastSeries>), FetchError>;

impl WeatherStore {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        let (state, _) = watch::channel(WeatherState::default());
        Self { provider, state: Arc::new(state), ledger: Arc::default() }
    }

    pub fn state(&self) -> WeatherState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> FetchStatus {
        self.state.borrow().status.clone()
    }

    pub fn snapshot(&self) -> Option<Arc<WeatherSnapshot>> {
        self.state.borrow().snapshot.clone()
    }

    pub fn forecast(&self) -> Option<Arc<ForecastSeries>> {
        self.state.borrow().forecast.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherState> {
        self.state.subscribe()
    }

    /// Enter `Loading` without touching the held data.
    pub fn mark_loading(&self) {
        self.state.send_if_modified(|state| {
            if state.status.is_loading() {
                return false;
            }
            state.status = FetchStatus::Loading;
            true
        });
    }

    /// Leave a `Loading` that no fetch is going to end, going back to the
    /// status of the last commit. Does nothing while a fetch is in flight.
    pub fn abandon_loading(&self) -> bool {
        let restored = self.state.send_if_modified(|state| {
            let ledger = self.ledger.lock();
            if !state.status.is_loading() || ledger.in_flight > 0 {
                return false;
            }
            state.status = ledger.settled.clone();
            true
        });
        if restored {
            debug!("abandoned loading with no fetch in flight");
        }
        restored
    }

    /// Fetch current conditions and forecast for `location`.
    ///
    /// Both must succeed for anything to be replaced. On failure the status
    /// carries the user-facing message and the previous data stays. When
    /// both requests fail the current-conditions error is the one reported.
    ///
    /// Overlapping calls are not coordinated: whichever completes last is
    /// what the store ends up holding.
    pub async fn load(&self, location: &Location) -> Result<Arc<WeatherSnapshot>, FetchError> {
        let _in_flight = self.begin();
        let fetched = self.fetch(location).await;
        self.commit(location, &fetched, || true);
        fetched.map(|(snapshot, _)| snapshot)
    }

    /// Like [`WeatherStore::load`], but the result is only committed if
    /// `still_current` holds at commit time. `None` means it was dropped.
    pub(crate) async fn load_if<F>(
        &self,
        location: &Location,
        still_current: F,
    ) -> Option<Result<Arc<WeatherSnapshot>, FetchError>>
    where
        F: Fn() -> bool,
    {
        let _in_flight = self.begin();
        let fetched = self.fetch(location).await;
        if self.commit(location, &fetched, still_current) {
            Some(fetched.map(|(snapshot, _)| snapshot))
        } else {
            debug!(%location, "superseded fetch discarded");
            None
        }
    }

    fn begin(&self) -> InFlight {
        self.ledger.lock().in_flight += 1;
        self.mark_loading();
        InFlight(Arc::clone(&self.ledger))
    }

    async fn fetch(&self, location: &Location) -> Fetched {
        debug!(%location, "loading weather");

        let (current, forecast) =
            tokio::join!(self.provider.current(location), self.provider.forecast(location));

        match (current, forecast) {
            (Ok(snapshot), Ok(forecast)) => Ok((Arc::new(snapshot), Arc::new(forecast))),
            (Err(err), _) | (Ok(_), Err(err)) => Err(err),
        }
    }

    fn commit<F>(&self, location: &Location, fetched: &Fetched, still_current: F) -> bool
    where
        F: Fn() -> bool,
    {
        self.state.send_if_modified(|state| {
            if !still_current() {
                return false;
            }

            match fetched {
                Ok((snapshot, forecast)) => {
                    info!(
                        %location,
                        place = %snapshot.name,
                        points = forecast.len(),
                        "weather loaded"
                    );
                    state.snapshot = Some(Arc::clone(snapshot));
                    state.forecast = Some(Arc::clone(forecast));
                    state.status = FetchStatus::Ready;
                }
                Err(err) => {
                    warn!(%location, error = %err, "weather fetch failed");
                    state.status = FetchStatus::Error(err.user_message());
                }
            }
            self.ledger.lock().settled = state.status.clone();
            true
        })
    }

    /// Wait until no fetch is in flight and return the state at that point.
    pub async fn wait_until_settled(&self) -> WeatherState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|state| !state.status.is_loading()).await {
            Ok(state) => (*state).clone(),
            Err(_) => self.state(),
        }
    }
}
