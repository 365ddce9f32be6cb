use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use xequtive_locator::config::LocatorConfig;
use xequtive_locator::location::{Coordinate, DeviceLocator, Geocoder, IpLocator, NominatimClient};
use xequtive_locator::picker::{LocationPicker, OnLocationSelect, SearchOutcome};
use xequtive_locator::server::{self, AppState};

/// Xequtive Locator: address search, click-to-address and coordinate entry
/// for the booking dashboard, backed by OpenStreetMap Nominatim.
///
/// Examples:
///   locator search "Trafalgar Square"
///   locator search 51.5074,-0.1278
///   locator reverse --lat 51.5014 --lng -0.1419
///   locator pick
///   locator serve --port 3030
#[derive(Parser)]
#[command(name = "locator", version, about, long_about = None)]
struct Cli {
    /// JSON config file. Defaults to <config dir>/xequtive/locator.json.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Nominatim base URL override.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search for an address, or resolve a "lat,lng" pair directly.
    Search {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        query: Vec<String>,
    },

    /// Resolve a point to an address, as a map click would.
    Reverse {
        /// Latitude (-90 to 90).
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude (-180 to 180).
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },

    /// Interactive picker session on stdin.
    ///
    /// Commands: search <text> | click <lat> <lng> | select <n> | state | quit
    Pick {
        /// Initial map latitude.
        #[arg(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<f64>,

        /// Initial map longitude.
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<f64>,

        /// Skip the startup device-location lookup.
        #[arg(long)]
        no_geolocation: bool,
    },

    /// Serve the geocoding proxy for the dashboard.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 3030)]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli);
    let geocoder: Arc<dyn Geocoder> = Arc::new(NominatimClient::new(&config));

    match cli.command {
        Command::Search { query } => run_search(&config, geocoder, &query.join(" ")).await,
        Command::Reverse { lat, lng } => run_reverse(&config, geocoder, lat, lng).await,
        Command::Pick { lat, lng, no_geolocation } => {
            let initial = match (lat, lng) {
                (Some(lat), Some(lng)) => Some(parse_coordinate(lat, lng)),
                _ => None,
            };
            let locator: Option<Arc<dyn DeviceLocator>> = if no_geolocation {
                None
            } else {
                Some(Arc::new(IpLocator::new(&config)))
            };
            run_pick(&config, geocoder, initial, locator).await;
        }
        Command::Serve { host, port } => {
            let state = Arc::new(AppState { config, geocoder });
            if let Err(e) = server::start(&host, port, state).await {
                eprintln!("Error: Cannot serve on {}:{}: {}", host, port, e);
                std::process::exit(1);
            }
        }
    }
}

fn load_config(cli: &Cli) -> LocatorConfig {
    let loaded = match &cli.config {
        Some(path) => LocatorConfig::load_from(path),
        None => LocatorConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    config
}

fn parse_coordinate(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    })
}

fn silent_callback() -> OnLocationSelect {
    Arc::new(|_: f64, _: f64, _: &str| {})
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Error: {}", e),
    }
}

async fn run_search(config: &LocatorConfig, geocoder: Arc<dyn Geocoder>, query: &str) {
    let picker = LocationPicker::initialize(config, None, geocoder, None, silent_callback());
    match picker.search(query).await {
        SearchOutcome::CoordinateEntry(selected) => print_json(&json!({ "selection": selected })),
        SearchOutcome::Suggestions(suggestions) => {
            if suggestions.is_empty() {
                eprintln!("  No results for \"{}\"", query);
            }
            print_json(&json!({ "suggestions": suggestions }));
        }
        SearchOutcome::Cleared | SearchOutcome::Superseded | SearchOutcome::Unmounted => {
            eprintln!("Error: Empty query.");
            std::process::exit(1);
        }
    }
}

async fn run_reverse(config: &LocatorConfig, geocoder: Arc<dyn Geocoder>, lat: f64, lng: f64) {
    let coord = parse_coordinate(lat, lng);
    let picker = LocationPicker::initialize(config, None, geocoder, None, silent_callback());
    if let Some(selected) = picker.handle_map_click(coord).await {
        print_json(&json!(selected));
    }
}

async fn run_pick(
    config: &LocatorConfig,
    geocoder: Arc<dyn Geocoder>,
    initial: Option<Coordinate>,
    locator: Option<Arc<dyn DeviceLocator>>,
) {
    let on_select: OnLocationSelect = Arc::new(|lat: f64, lng: f64, address: &str| {
        print_json(&json!({ "lat": lat, "lng": lng, "address": address }));
    });
    let picker = LocationPicker::initialize(config, initial, geocoder, locator, on_select);

    eprintln!("  search <text> | click <lat> <lng> | select <n> | state | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        };
        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));

        match cmd {
            "" => {}
            "search" => {
                let picker = picker.clone();
                let query = rest.to_string();
                tokio::spawn(async move {
                    if let SearchOutcome::Suggestions(found) = picker.search(&query).await {
                        if found.is_empty() {
                            eprintln!("  No results for \"{}\"", query);
                        }
                        for (i, s) in found.iter().enumerate() {
                            eprintln!("  {}. {} [{}] ({}, {})", i + 1, s.label, s.kind, s.lat, s.lng);
                        }
                    }
                });
            }
            "click" => {
                let mut parts = rest.split_whitespace().map(str::parse::<f64>);
                let coord = match (parts.next(), parts.next()) {
                    (Some(Ok(lat)), Some(Ok(lng))) => Coordinate::new(lat, lng),
                    _ => {
                        eprintln!("  usage: click <lat> <lng>");
                        continue;
                    }
                };
                match coord {
                    Ok(coord) => {
                        let picker = picker.clone();
                        tokio::spawn(async move {
                            picker.handle_map_click(coord).await;
                        });
                    }
                    Err(e) => eprintln!("  {}", e),
                }
            }
            "select" => match rest.trim().parse::<usize>() {
                Ok(n) if n >= 1 => match picker.select_visible(n - 1) {
                    Ok(Some(_)) => {}
                    Ok(None) => eprintln!("  No suggestion #{}", n),
                    Err(e) => eprintln!("  {}", e),
                },
                _ => eprintln!("  usage: select <n>"),
            },
            "state" => print_json(&json!({
                "phase": picker.phase(),
                "view": picker.view(),
                "state": picker.state(),
                "selection": picker.selection(),
            })),
            "quit" | "exit" => break,
            other => eprintln!("  Unknown command '{}'", other),
        }
    }

    picker.unmount();
}
