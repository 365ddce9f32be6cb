//! The geocoding proxy routes, backed by a scripted geocoder.

use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use xequtive_locator::config::LocatorConfig;
use xequtive_locator::location::{Coordinate, GeocodeSuggestion, Geocoder, LocationError};
use xequtive_locator::server::{build_router, AppState};

#[derive(Default)]
struct Scripted {
    calls: AtomicUsize,
}

impl Geocoder for Scripted {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<GeocodeSuggestion>, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if query != "Trafalgar" {
            return Err(LocationError::Network("connection refused".into()));
        }
        Ok((0..limit)
            .map(|i| GeocodeSuggestion {
                id: i.to_string(),
                lat: 51.5 + i as f64 / 100.0,
                lng: -0.12,
                label: format!("Trafalgar {}", i),
                kind: "square".into(),
                rank: 1.0 - i as f64 / 10.0,
            })
            .collect())
    }

    fn reverse(&self, coord: Coordinate) -> Result<String, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if coord.lat() > 0.0 {
            Ok("Somewhere north".into())
        } else {
            Err(LocationError::Status(502))
        }
    }
}

async fn spawn_server() -> (String, Arc<Scripted>) {
    let geocoder = Arc::new(Scripted::default());
    let state = Arc::new(AppState {
        config: LocatorConfig::default(),
        geocoder: Arc::clone(&geocoder) as Arc<dyn Geocoder>,
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    (format!("http://{}", addr), geocoder)
}

/// GET and return (status, json body), treating 4xx/5xx as data.
async fn get(url: String, params: Vec<(&'static str, String)>) -> (u16, Value) {
    tokio::task::spawn_blocking(move || {
        let mut request = ureq::get(&url);
        for (k, v) in &params {
            request = request.query(k, v);
        }
        let response = match request.call() {
            Ok(r) => r,
            Err(ureq::Error::Status(_, r)) => r,
            Err(e) => panic!("request failed: {}", e),
        };
        let status = response.status();
        let body: Value = response.into_json().unwrap();
        (status, body)
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn coordinate_entry_is_resolved_without_upstream() {
    let (base, geocoder) = spawn_server().await;
    let (status, body) = get(format!("{}/api/search", base), vec![("q", "51.5074,-0.1278".into())]).await;

    assert_eq!(status, 200);
    assert_eq!(body["selection"]["address"], "51.5074, -0.1278");
    assert_eq!(body["selection"]["source"], "coordinate-entry");
    assert_eq!(body["selection"]["coordinate"]["lat"], 51.5074);
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 0);
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn text_search_returns_ranked_suggestions() {
    let (base, _) = spawn_server().await;
    let (status, body) = get(format!("{}/api/search", base), vec![("q", "Trafalgar".into())]).await;

    assert_eq!(status, 200);
    assert!(body["selection"].is_null());
    let labels: Vec<&str> = body["suggestions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["Trafalgar 0", "Trafalgar 1", "Trafalgar 2", "Trafalgar 3", "Trafalgar 4"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_or_failed_search_yields_no_suggestions() {
    let (base, geocoder) = spawn_server().await;

    let (status, body) = get(format!("{}/api/search", base), vec![("q", "   ".into())]).await;
    assert_eq!(status, 200);
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 0);
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);

    let (status, body) = get(format!("{}/api/search", base), vec![]).await;
    assert_eq!(status, 200);
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 0);

    let (status, body) = get(format!("{}/api/search", base), vec![("q", "Atlantis".into())]).await;
    assert_eq!(status, 200);
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 0);
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn reverse_always_answers_for_valid_points() {
    let (base, _) = spawn_server().await;

    let (status, body) = get(
        format!("{}/api/reverse", base),
        vec![("lat", "10.5".into()), ("lng", "20.25".into())],
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["address"], "Somewhere north");
    assert_eq!(body["source"], "click");

    let (status, body) = get(
        format!("{}/api/reverse", base),
        vec![("lat", "-10.5".into()), ("lng", "20.25".into())],
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["address"], "Unknown location");
    assert_eq!(body["coordinate"]["lat"], -10.5);
    assert_eq!(body["coordinate"]["lng"], 20.25);
}

#[tokio::test(flavor = "multi_thread")]
async fn reverse_rejects_bad_coordinates() {
    let (base, geocoder) = spawn_server().await;

    let (status, body) = get(
        format!("{}/api/reverse", base),
        vec![("lat", "120".into()), ("lng", "0".into())],
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], 400);

    let (status, body) = get(format!("{}/api/reverse", base), vec![("lat", "1".into())]).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], 400);

    let (status, body) = get(
        format!("{}/api/reverse", base),
        vec![("lat", "abc".into()), ("lng", "0".into())],
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().contains("lat"));
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_is_ok() {
    let (base, _) = spawn_server().await;
    let (status, body) = get(format!("{}/api/health", base), vec![]).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}
