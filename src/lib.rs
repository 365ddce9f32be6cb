//! Xequtive locator: the booking dashboard's location picker.
//!
//! Resolves typed addresses, map clicks and `"lat,lng"` entries into a
//! `{lat, lng, address}` selection through a Nominatim geocoding service.

pub mod config;
pub mod location;
pub mod picker;
pub mod server;
