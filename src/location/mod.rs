//! Location subsystem for the Xequtive locator.
//!
//! Provides the coordinate/selection types, strict coordinate-entry parsing,
//! and the Nominatim and device-geolocation providers.

pub mod entry;
pub mod providers;
pub mod types;

pub use entry::{entry_address, parse_coordinate_entry};
pub use providers::{DeviceLocator, Geocoder, IpLocator, NoDeviceLocation, NominatimClient};
pub use types::{
    Coordinate, GeocodeSuggestion, LocationError, SelectedLocation, SelectionSource, UNKNOWN_LOCATION,
};
