//! Location providers: Nominatim geocoding and device geolocation.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{Coordinate, GeocodeSuggestion, LocationError};
use crate::config::LocatorConfig;

/// Zoom level requested from the reverse endpoint (building/street detail).
const REVERSE_ZOOM: &str = "18";

/// A forward/reverse geocoding backend.
///
/// Calls are blocking; async callers run them on the blocking pool.
pub trait Geocoder: Send + Sync + 'static {
    /// Forward geocode `query`, returning at most `limit` suggestions in the
    /// service's relevance order.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<GeocodeSuggestion>, LocationError>;

    /// Reverse geocode a point to a display address.
    fn reverse(&self, coord: Coordinate) -> Result<String, LocationError>;
}

/// One-shot source for the device's current position.
pub trait DeviceLocator: Send + Sync + 'static {
    fn locate(&self) -> Result<Coordinate, LocationError>;
}

// ─── Nominatim provider ─────────────────────────────────────────

/// A search hit as Nominatim sends it. Every field is optional here and
/// checked in [`place_to_suggestion`].
#[derive(Deserialize, Debug, Default)]
struct NominatimPlace {
    #[serde(default)]
    place_id: Option<Value>,
    #[serde(default)]
    lat: Option<Value>,
    #[serde(default)]
    lon: Option<Value>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default, rename = "type")]
    place_type: Option<Value>,
    #[serde(default)]
    importance: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct NominatimReverse {
    #[serde(default)]
    display_name: Option<String>,
}

/// OpenStreetMap Nominatim over blocking HTTP.
pub struct NominatimClient {
    agent: ureq::Agent,
    base_url: String,
    accept_language: String,
}

impl NominatimClient {
    pub fn new(config: &LocatorConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            accept_language: config.accept_language.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl Geocoder for NominatimClient {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<GeocodeSuggestion>, LocationError> {
        debug!(query, limit, "nominatim search");
        let response = self
            .agent
            .get(&self.endpoint("search"))
            .set("Accept-Language", &self.accept_language)
            .query("format", "json")
            .query("q", query)
            .query("limit", &limit.to_string())
            .call()?;

        let body: Value = response
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;

        let mut suggestions = parse_search_results(body)?;
        suggestions.truncate(limit);
        Ok(suggestions)
    }

    fn reverse(&self, coord: Coordinate) -> Result<String, LocationError> {
        debug!(lat = coord.lat(), lng = coord.lng(), "nominatim reverse");
        let response = self
            .agent
            .get(&self.endpoint("reverse"))
            .set("Accept-Language", &self.accept_language)
            .query("format", "json")
            .query("lat", &coord.lat().to_string())
            .query("lon", &coord.lng().to_string())
            .query("zoom", REVERSE_ZOOM)
            .query("addressdetails", "1")
            .call()?;

        let body: NominatimReverse = response
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;

        body.display_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LocationError::InvalidResponse("no display_name".into()))
    }
}

/// Turn a raw `/search` body into suggestions, keeping the service order.
/// Malformed entries are dropped; a body that is not an array is an error.
fn parse_search_results(body: Value) -> Result<Vec<GeocodeSuggestion>, LocationError> {
    let Value::Array(entries) = body else {
        return Err(LocationError::InvalidResponse("expected a JSON array".into()));
    };

    let suggestions = entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let place: NominatimPlace = match serde_json::from_value(entry) {
                Ok(p) => p,
                Err(e) => {
                    warn!(index = i, error = %e, "dropping malformed search entry");
                    return None;
                }
            };
            let parsed = place_to_suggestion(place, i);
            if parsed.is_none() {
                warn!(index = i, "dropping search entry without usable coordinates or name");
            }
            parsed
        })
        .collect();
    Ok(suggestions)
}

fn place_to_suggestion(place: NominatimPlace, index: usize) -> Option<GeocodeSuggestion> {
    let lat = place.lat.as_ref().and_then(lenient_f64)?;
    let lng = place.lon.as_ref().and_then(lenient_f64)?;
    let coord = Coordinate::new(lat, lng).ok()?;
    let label = place.display_name.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;

    let id = match place.place_id {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("result-{}", index),
    };

    Some(GeocodeSuggestion {
        id,
        lat: coord.lat(),
        lng: coord.lng(),
        label,
        kind: match place.place_type {
            Some(Value::String(s)) => s,
            _ => String::new(),
        },
        rank: place
            .importance
            .as_ref()
            .and_then(lenient_f64)
            .filter(|r| r.is_finite())
            .unwrap_or(0.0),
    })
}

/// Nominatim sends coordinates as strings; accept plain numbers too.
fn lenient_f64(v: &Value) -> Option<f64> {
    match v {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

// ─── IP-based device geolocation ────────────────────────────────

const IP_API_URL: &str = "https://ipapi.co/json/";

#[derive(Deserialize)]
struct IpApiResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Approximates the device position from its public IP address.
pub struct IpLocator {
    agent: ureq::Agent,
    url: String,
}

impl IpLocator {
    pub fn new(config: &LocatorConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build();
        Self { agent, url: IP_API_URL.to_string() }
    }
}

impl DeviceLocator for IpLocator {
    fn locate(&self) -> Result<Coordinate, LocationError> {
        let r: IpApiResult = self
            .agent
            .get(&self.url)
            .call()?
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;

        let lat = r.latitude.ok_or_else(|| LocationError::Unavailable("no latitude".into()))?;
        let lon = r.longitude.ok_or_else(|| LocationError::Unavailable("no longitude".into()))?;
        Coordinate::new(lat, lon)
    }
}

/// A locator for hosts without any position source.
pub struct NoDeviceLocation;

impl DeviceLocator for NoDeviceLocation {
    fn locate(&self) -> Result<Coordinate, LocationError> {
        Err(LocationError::Unavailable("geolocation disabled".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    #[test]
    fn test_parse_keeps_service_order() {
        let body = json!([
            {"place_id": 3, "lat": "51.5", "lon": "-0.12", "display_name": "Low", "type": "road", "importance": 0.2},
            {"place_id": 1, "lat": "51.6", "lon": "-0.13", "display_name": "High", "type": "square", "importance": 0.9},
        ]);
        let s = parse_search_results(body).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].label, "Low");
        assert_eq!(s[1].label, "High");
        assert_eq!(s[0].id, "3");
        assert_eq!(s[0].kind, "road");
        assert_abs_diff_eq!(s[1].rank, 0.9);
    }

    #[test]
    fn test_parse_drops_malformed_entries() {
        let body = json!([
            {"place_id": 1, "lat": "not-a-number", "lon": "0", "display_name": "Bad lat"},
            {"place_id": 2, "lat": "95", "lon": "0", "display_name": "Out of range"},
            {"place_id": 3, "lat": "10", "lon": "20"},
            {"place_id": 4, "lat": "10", "lon": "20", "display_name": "Kept", "importance": "high"},
            {"place_id": 5, "lat": 10.5, "lon": 20.5, "display_name": "Numeric coords"},
            "garbage",
        ]);
        let s = parse_search_results(body).unwrap();
        let labels: Vec<&str> = s.iter().map(|x| x.label.as_str()).collect();
        assert_eq!(labels, vec!["Kept", "Numeric coords"]);
        assert_eq!(s[0].rank, 0.0);
    }

    #[test]
    fn test_parse_tolerates_odd_optional_fields() {
        let body = json!([
            {"lat": "51.5", "lon": "-0.12", "display_name": "Trafalgar Square", "importance": "0.8"},
            {"lat": "51.6", "lon": "-0.13", "display_name": "Typed", "type": 7},
        ]);
        let s = parse_search_results(body).unwrap();
        assert_eq!(s.len(), 2);
        assert_abs_diff_eq!(s[0].rank, 0.8);
        assert_eq!(s[1].label, "Typed");
        assert_eq!(s[1].kind, "");
    }

    #[test]
    fn test_parse_defaults_optional_fields() {
        let body = json!([{"lat": "1", "lon": "2", "display_name": "Somewhere"}]);
        let s = parse_search_results(body).unwrap();
        assert_eq!(s[0].id, "result-0");
        assert_eq!(s[0].kind, "");
        assert_eq!(s[0].rank, 0.0);
    }

    #[test]
    fn test_parse_string_place_id() {
        let body = json!([{"place_id": "N123", "lat": "1", "lon": "2", "display_name": "X"}]);
        let s = parse_search_results(body).unwrap();
        assert_eq!(s[0].id, "N123");
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = parse_search_results(json!({"error": "Unable to geocode"})).unwrap_err();
        assert!(matches!(err, LocationError::InvalidResponse(_)));
    }

    #[test]
    fn test_no_device_location() {
        assert!(matches!(NoDeviceLocation.locate(), Err(LocationError::Unavailable(_))));
    }
}
