use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::location::{Coordinate, GeocodeSuggestion, SelectedLocation};
use crate::picker::{LocationPicker, OnLocationSelect, SearchOutcome};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

/// A throwaway picker for one request. Results are read from the returned
/// outcome, so the callback has nothing to do.
fn request_picker(state: &AppState) -> LocationPicker {
    let on_select: OnLocationSelect = Arc::new(|_: f64, _: f64, _: &str| {});
    LocationPicker::initialize(&state.config, None, Arc::clone(&state.geocoder), None, on_select)
}

// ─── GET /api/search ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    /// Set when the query was a `"lat,lng"` pair.
    pub selection: Option<SelectedLocation>,
    pub suggestions: Vec<GeocodeSuggestion>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Json<SearchResponse> {
    let start = Instant::now();
    let query = params.q.unwrap_or_default();

    let picker = request_picker(&state);
    let response = match picker.search(&query).await {
        SearchOutcome::CoordinateEntry(selected) => SearchResponse {
            selection: Some(selected),
            suggestions: Vec::new(),
        },
        SearchOutcome::Suggestions(suggestions) => SearchResponse {
            selection: None,
            suggestions,
        },
        SearchOutcome::Cleared | SearchOutcome::Superseded | SearchOutcome::Unmounted => SearchResponse {
            selection: None,
            suggestions: Vec::new(),
        },
    };
    picker.unmount();

    info!(
        query = %query,
        results = response.suggestions.len(),
        coordinate_entry = response.selection.is_some(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/search"
    );
    Json(response)
}

// ─── GET /api/reverse ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ReverseQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
}

fn parse_param(name: &str, value: Option<&str>) -> Result<f64, ApiError> {
    let Some(raw) = value else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Provide 'lat' and 'lng' parameters"));
    };
    raw.trim()
        .parse()
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, format!("'{}' is not a number: {}", name, raw)))
}

pub async fn reverse(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReverseQuery>,
) -> Result<Json<SelectedLocation>, ApiError> {
    let start = Instant::now();

    let lat = parse_param("lat", params.lat.as_deref())?;
    let lng = parse_param("lng", params.lng.as_deref())?;
    let coord = Coordinate::new(lat, lng).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let picker = request_picker(&state);
    let selected = picker.handle_map_click(coord).await.ok_or_else(|| {
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Location picker closed before resolving")
    })?;
    picker.unmount();

    info!(
        lat,
        lng,
        address = %selected.address,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/reverse"
    );
    Ok(Json(selected))
}

// ─── GET /api/health ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
