//! The location picker: an address search box, a clickable map and a
//! `"lat,lng"` entry path, all reporting through one callback.
//!
//! [`LocationPicker`] is a cheap handle; clones share one session. Geocoding
//! runs on tokio's blocking pool, session state sits behind a std mutex that
//! is never held across an await.

pub mod session;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::LocatorConfig;
use crate::location::{Coordinate, DeviceLocator, GeocodeSuggestion, Geocoder, LocationError, SelectedLocation};

pub use session::{MapView, Phase, PickerSession, PickerSessionState, SearchAction, SearchTicket};

/// `onLocationSelect(lat, lng, address)`, called once per resolved selection.
pub type OnLocationSelect = Arc<dyn Fn(f64, f64, &str) + Send + Sync>;

/// Result of one `search` call, for callers that want more than the callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Empty query; suggestions cleared.
    Cleared,
    /// The query was a coordinate pair and has been emitted.
    CoordinateEntry(SelectedLocation),
    /// This search was the latest one; these are the visible suggestions.
    Suggestions(Vec<GeocodeSuggestion>),
    /// A newer search or a selection came first; the response was dropped.
    Superseded,
    Unmounted,
}

#[derive(Clone)]
pub struct LocationPicker {
    inner: Arc<Inner>,
}

struct Inner {
    session: Mutex<PickerSession>,
    geocoder: Arc<dyn Geocoder>,
    on_select: OnLocationSelect,
    search_limit: usize,
    /// Serializes reverse lookups so clicks resolve in click order.
    click_lane: tokio::sync::Mutex<()>,
    geolocation: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, PickerSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocationPicker {
    /// Mount a picker centered at `initial_position` (or the configured
    /// default). With a `locator`, one device-position request is started in
    /// the background; its failure is only logged.
    ///
    /// Must be called from within a tokio runtime.
    pub fn initialize(
        config: &LocatorConfig,
        initial_position: Option<Coordinate>,
        geocoder: Arc<dyn Geocoder>,
        locator: Option<Arc<dyn DeviceLocator>>,
        on_select: OnLocationSelect,
    ) -> Self {
        let center = initial_position.unwrap_or(config.default_position);
        let inner = Arc::new(Inner {
            session: Mutex::new(PickerSession::new(center, config.initial_zoom, config.focus_zoom)),
            geocoder,
            on_select,
            search_limit: config.search_limit,
            click_lane: tokio::sync::Mutex::new(()),
            geolocation: Mutex::new(None),
        });

        if let Some(locator) = locator {
            let weak = Arc::downgrade(&inner);
            let handle = tokio::spawn(async move {
                let result = run_blocking(move || locator.locate()).await;
                let Some(inner) = weak.upgrade() else { return };
                match result {
                    Ok(here) => {
                        debug!(lat = here.lat(), lng = here.lng(), "device location found");
                        inner.session().set_user_location(here);
                    }
                    Err(e) => warn!(error = %e, "device geolocation unavailable"),
                }
            });
            *inner.geolocation.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }

        debug!(lat = center.lat(), lng = center.lng(), "location picker mounted");
        Self { inner }
    }

    /// Wait for the startup geolocation request, if one is still running.
    pub async fn geolocation_settled(&self) {
        let handle = self
            .inner
            .geolocation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub async fn search(&self, query: &str) -> SearchOutcome {
        let action = {
            let mut session = self.inner.session();
            if session.is_unmounted() {
                return SearchOutcome::Unmounted;
            }
            session.begin_search(query)
        };

        let ticket = match action {
            SearchAction::Cleared => return SearchOutcome::Cleared,
            SearchAction::CoordinateEntry(selected) => {
                self.emit(&selected);
                return SearchOutcome::CoordinateEntry(selected);
            }
            SearchAction::Fetch(ticket) => ticket,
        };

        let geocoder = Arc::clone(&self.inner.geocoder);
        let limit = self.inner.search_limit;
        let query = ticket.query.clone();
        let result = run_blocking(move || geocoder.search(&query, limit))
            .await
            .map(|mut found| {
                found.truncate(limit);
                found
            });
        if let Err(e) = &result {
            warn!(query = %ticket.query, error = %e, "address search failed");
        }

        let mut session = self.inner.session();
        if session.finish_search(ticket.id, result) {
            SearchOutcome::Suggestions(session.state().suggestions.clone())
        } else if session.is_unmounted() {
            SearchOutcome::Unmounted
        } else {
            debug!(query = %ticket.query, id = ticket.id, "discarding stale search response");
            SearchOutcome::Superseded
        }
    }

    pub fn select_suggestion(&self, item: &GeocodeSuggestion) -> Result<SelectedLocation, LocationError> {
        let selected = self.inner.session().select_suggestion(item)?;
        self.emit(&selected);
        Ok(selected)
    }

    /// Select the `index`-th visible suggestion.
    pub fn select_visible(&self, index: usize) -> Result<Option<SelectedLocation>, LocationError> {
        let item = self.inner.session().state().suggestions.get(index).cloned();
        item.map(|item| self.select_suggestion(&item)).transpose()
    }

    /// Place the marker, reverse-geocode, and emit. Returns `None` only when
    /// the picker was unmounted before the address came back.
    pub async fn handle_map_click(&self, coord: Coordinate) -> Option<SelectedLocation> {
        if self.inner.session().begin_click(coord).is_err() {
            return None;
        }

        // Clicks resolve one at a time, so a lookup waiting on the timeout
        // delays the callbacks of every click queued behind it.
        let _lane = self.inner.click_lane.lock().await;
        let geocoder = Arc::clone(&self.inner.geocoder);
        let address = run_blocking(move || geocoder.reverse(coord)).await;
        if let Err(e) = &address {
            warn!(lat = coord.lat(), lng = coord.lng(), error = %e, "reverse geocoding failed");
        }

        let selected = self.inner.session().finish_click(coord, address);
        self.emit(&selected).then_some(selected)
    }

    /// Tear down: background work is abandoned and no callback fires again.
    pub fn unmount(&self) {
        self.inner.session().unmount();
        let handle = self
            .inner
            .geolocation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        debug!("location picker unmounted");
    }

    pub fn state(&self) -> PickerSessionState {
        self.inner.session().state().clone()
    }

    pub fn view(&self) -> MapView {
        self.inner.session().view()
    }

    pub fn phase(&self) -> Phase {
        self.inner.session().phase()
    }

    pub fn selection(&self) -> Option<SelectedLocation> {
        self.inner.session().selection().cloned()
    }

    /// Invoke the callback unless unmounted. The session lock is released
    /// first so the callback may call back into the picker.
    fn emit(&self, selected: &SelectedLocation) -> bool {
        if self.inner.session().is_unmounted() {
            return false;
        }
        info!(
            lat = selected.lat(),
            lng = selected.lng(),
            source = %selected.source,
            address = %selected.address,
            "location selected"
        );
        (self.inner.on_select)(selected.lat(), selected.lng(), &selected.address);
        true
    }
}

/// Run a blocking provider call off the async threads.
async fn run_blocking<T, F>(f: F) -> Result<T, LocationError>
where
    F: FnOnce() -> Result<T, LocationError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LocationError::Network(format!("geocoding task failed: {}", e)))?
}
