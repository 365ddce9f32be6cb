//! Picker session state machine.
//!
//! Pure and synchronous: every user event is split into a `begin_*` step that
//! updates the visible state and tells the driver what network work to do,
//! and a `finish_*` step that applies the result. Search requests carry a
//! sequence id; only the latest issued id may touch the suggestion list.

use serde::Serialize;

use crate::location::{
    entry_address, parse_coordinate_entry, Coordinate, GeocodeSuggestion, LocationError,
    SelectedLocation, SelectionSource, UNKNOWN_LOCATION,
};

/// Where the picker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    Searching,
    SuggestionsShown,
    Resolving,
    Unmounted,
}

/// The map viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    pub center: Coordinate,
    pub zoom: u8,
}

/// Everything the picker renders besides the map viewport.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PickerSessionState {
    pub search_text: String,
    pub suggestions: Vec<GeocodeSuggestion>,
    pub is_searching: bool,
    pub current_marker: Option<Coordinate>,
    pub user_location_marker: Option<Coordinate>,
}

/// A forward search the driver must run.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTicket {
    pub id: u64,
    pub query: String,
}

/// What a `Search` event turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchAction {
    /// Empty query: suggestions cleared, nothing to fetch.
    Cleared,
    /// A `"lat,lng"` entry resolved locally; emit it.
    CoordinateEntry(SelectedLocation),
    /// Run this search, then call [`PickerSession::finish_search`].
    Fetch(SearchTicket),
}

#[derive(Debug)]
pub struct PickerSession {
    state: PickerSessionState,
    view: MapView,
    phase: Phase,
    focus_zoom: u8,
    latest_search: u64,
    pending_clicks: usize,
    selection: Option<SelectedLocation>,
}

impl PickerSession {
    pub fn new(center: Coordinate, initial_zoom: u8, focus_zoom: u8) -> Self {
        Self {
            state: PickerSessionState::default(),
            view: MapView { center, zoom: initial_zoom },
            phase: Phase::Idle,
            focus_zoom,
            latest_search: 0,
            pending_clicks: 0,
            selection: None,
        }
    }

    pub fn state(&self) -> &PickerSessionState {
        &self.state
    }

    pub fn view(&self) -> MapView {
        self.view
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selection(&self) -> Option<&SelectedLocation> {
        self.selection.as_ref()
    }

    pub fn is_unmounted(&self) -> bool {
        self.phase == Phase::Unmounted
    }

    pub fn begin_search(&mut self, query: &str) -> SearchAction {
        // Any new search supersedes whatever is still in flight.
        self.latest_search += 1;
        self.state.search_text = query.to_string();

        let trimmed = query.trim();
        if trimmed.is_empty() {
            self.clear_suggestions();
            self.settle();
            return SearchAction::Cleared;
        }

        if let Some(coord) = parse_coordinate_entry(trimmed) {
            self.clear_suggestions();
            self.focus(coord);
            let selected = SelectedLocation {
                coordinate: coord,
                address: entry_address(&coord),
                source: SelectionSource::CoordinateEntry,
            };
            self.selection = Some(selected.clone());
            self.settle();
            return SearchAction::CoordinateEntry(selected);
        }

        self.state.is_searching = true;
        self.settle();
        SearchAction::Fetch(SearchTicket { id: self.latest_search, query: trimmed.to_string() })
    }

    /// Apply a search response. Returns `false` when the response is stale
    /// (a newer search or a selection happened since) and was discarded.
    pub fn finish_search(
        &mut self,
        id: u64,
        result: Result<Vec<GeocodeSuggestion>, LocationError>,
    ) -> bool {
        if self.is_unmounted() || id != self.latest_search {
            return false;
        }
        self.state.is_searching = false;
        self.state.suggestions = result.unwrap_or_default();
        self.settle();
        true
    }

    pub fn select_suggestion(
        &mut self,
        item: &GeocodeSuggestion,
    ) -> Result<SelectedLocation, LocationError> {
        if self.is_unmounted() {
            return Err(LocationError::Unmounted);
        }
        let coord = item.coordinate()?;
        self.latest_search += 1;
        self.clear_suggestions();
        self.state.search_text = item.label.clone();
        self.focus(coord);

        let selected = SelectedLocation {
            coordinate: coord,
            address: item.label.clone(),
            source: SelectionSource::Suggestion,
        };
        self.selection = Some(selected.clone());
        self.settle();
        Ok(selected)
    }

    /// Move the marker to the clicked point right away; the address follows
    /// in [`PickerSession::finish_click`].
    pub fn begin_click(&mut self, coord: Coordinate) -> Result<(), LocationError> {
        if self.is_unmounted() {
            return Err(LocationError::Unmounted);
        }
        self.latest_search += 1;
        self.clear_suggestions();
        self.state.current_marker = Some(coord);
        self.pending_clicks += 1;
        self.settle();
        Ok(())
    }

    /// Resolve a click. A failed lookup still yields a selection, addressed
    /// as [`UNKNOWN_LOCATION`], at the clicked point.
    pub fn finish_click(
        &mut self,
        coord: Coordinate,
        address: Result<String, LocationError>,
    ) -> SelectedLocation {
        self.pending_clicks = self.pending_clicks.saturating_sub(1);
        let selected = SelectedLocation {
            coordinate: coord,
            address: address.unwrap_or_else(|_| UNKNOWN_LOCATION.to_string()),
            source: SelectionSource::Click,
        };
        if !self.is_unmounted() {
            self.state.current_marker = Some(coord);
            self.selection = Some(selected.clone());
            self.settle();
        }
        selected
    }

    /// Device position arrived: show it and recenter, keeping the zoom.
    pub fn set_user_location(&mut self, coord: Coordinate) {
        if self.is_unmounted() {
            return;
        }
        self.state.user_location_marker = Some(coord);
        self.view.center = coord;
    }

    pub fn unmount(&mut self) {
        self.phase = Phase::Unmounted;
        self.clear_suggestions();
    }

    fn clear_suggestions(&mut self) {
        self.state.suggestions.clear();
        self.state.is_searching = false;
    }

    fn focus(&mut self, coord: Coordinate) {
        self.view = MapView { center: coord, zoom: self.focus_zoom };
        self.state.current_marker = Some(coord);
    }

    fn settle(&mut self) {
        if self.is_unmounted() {
            return;
        }
        self.phase = if self.pending_clicks > 0 {
            Phase::Resolving
        } else if self.state.is_searching {
            Phase::Searching
        } else if !self.state.suggestions.is_empty() {
            Phase::SuggestionsShown
        } else {
            Phase::Idle
        };
    }
}
