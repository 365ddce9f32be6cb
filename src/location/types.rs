//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address reported when a clicked point cannot be reverse-geocoded.
pub const UNKNOWN_LOCATION: &str = "Unknown location";

/// A WGS84 point. Always within `lat ∈ [-90, 90]`, `lng ∈ [-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = LocationError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, LocationError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(LocationError::InvalidCoordinate { lat, lng });
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(LocationError::InvalidCoordinate { lat, lng });
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl Default for Coordinate {
    /// Central London, the dashboard's default map center.
    fn default() -> Self {
        Self { lat: 51.505, lng: -0.09 }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.lat, self.lng)
    }
}

/// One candidate returned by a forward search, in service rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeSuggestion {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub label: String,
    pub kind: String,
    pub rank: f64,
}

impl GeocodeSuggestion {
    pub fn coordinate(&self) -> Result<Coordinate, LocationError> {
        Coordinate::new(self.lat, self.lng)
    }
}

/// How a selection was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionSource {
    Click,
    Suggestion,
    CoordinateEntry,
}

impl fmt::Display for SelectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click => write!(f, "click"),
            Self::Suggestion => write!(f, "suggestion"),
            Self::CoordinateEntry => write!(f, "coordinate-entry"),
        }
    }
}

/// The resolved value handed to the embedding form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedLocation {
    pub coordinate: Coordinate,
    pub address: String,
    pub source: SelectionSource,
}

impl SelectedLocation {
    pub fn lat(&self) -> f64 {
        self.coordinate.lat()
    }

    pub fn lng(&self) -> f64 {
        self.coordinate.lng()
    }
}

/// Location resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Geocoding service returned status {0}")]
    Status(u16),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Invalid coordinates ({lat}, {lng}). Lat: -90..90, Lng: -180..180")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("Device location unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Location picker has been unmounted")]
    Unmounted,
}

impl From<ureq::Error> for LocationError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, _) => Self::Status(code),
            ureq::Error::Transport(t) => Self::Network(t.to_string()),
        }
    }
}
