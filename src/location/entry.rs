//! Direct coordinate entry: a query typed as `"<lat>,<lng>"`.
//!
//! Only plain decimals are accepted (optional leading `-`, digits, optional
//! `.digits`). Anything else, including out-of-range pairs, is an ordinary
//! text query.

use super::types::Coordinate;

/// Parse a strict `"lat,lng"` pair. Whitespace around the numbers is allowed.
pub fn parse_coordinate_entry(query: &str) -> Option<Coordinate> {
    let (lat_raw, lng_raw) = query.trim().split_once(',')?;
    let (lat_raw, lng_raw) = (lat_raw.trim(), lng_raw.trim());
    if !is_plain_decimal(lat_raw) || !is_plain_decimal(lng_raw) {
        return None;
    }
    let lat: f64 = lat_raw.parse().ok()?;
    let lng: f64 = lng_raw.parse().ok()?;
    Coordinate::new(lat, lng).ok()
}

/// The address shown for a coordinate entry, e.g. `"51.5074, -0.1278"`.
pub fn entry_address(coord: &Coordinate) -> String {
    coord.to_string()
}

fn is_plain_decimal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    all_digits(int_part) && frac_part.map_or(true, all_digits)
}
