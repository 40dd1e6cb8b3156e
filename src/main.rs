//! CLI entry point for the Transition toolkit.
//!
//! Provides the vector rasterize/polygonize round trip and subcommands that
//! query a Transition server for network data, routes and accessibility maps.

use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transition_toolkit::{
    config::RasterizeConfig,
    fetch::BasicClient,
    infra::transition::client::TransitionClient,
    output::emit,
    pipeline,
    services::transition_api::{
        AccessibilityMapRequest, Credentials, RouteRequest, TransitionApi, TripTime,
    },
};

#[derive(Parser)]
#[command(name = "transition_toolkit")]
#[command(about = "Rasterize vector layers and query a Transition server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ServerArgs {
    /// Base URL of the Transition server
    #[arg(long, env = "TRANSITION_URL")]
    url: String,

    #[arg(long, env = "TRANSITION_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "TRANSITION_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Token from an earlier login, used when no username/password is given
    #[arg(long, env = "TRANSITION_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// JSON file to write the response to (logged when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct TimeArgs {
    /// Time of day, HH:MM or HH:MM:SS
    #[arg(long, value_parser = parse_time)]
    time: NaiveTime,

    /// Treat --time as the arrival time instead of the departure time
    #[arg(long, default_value_t = false)]
    arrival: bool,
}

impl TimeArgs {
    fn trip_time(&self) -> TripTime {
        if self.arrival {
            TripTime::arrival(self.time)
        } else {
            TripTime::departure(self.time)
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Burn a GeoJSON layer into a raster and polygonize it back
    Rasterize {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// JSON run configuration; flags below override its fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pixel size in meters
        #[arg(short, long)]
        resolution: Option<f64>,

        #[arg(long)]
        no_data: Option<i64>,

        #[arg(long)]
        burn_value: Option<i64>,

        /// Drop regions holding the no-data value from the output
        #[arg(long, default_value_t = false)]
        exclude_no_data: bool,

        /// Largest latitude span in degrees accepted for one local scale
        #[arg(long)]
        max_latitude_span: Option<f64>,

        /// Keep a copy of the intermediate raster at this path
        #[arg(long)]
        keep_raster: Option<PathBuf>,
    },
    /// Fetch transit nodes as GeoJSON
    Nodes {
        #[command(flatten)]
        server: ServerArgs,
    },
    /// Fetch transit paths as GeoJSON
    Paths {
        #[command(flatten)]
        server: ServerArgs,
    },
    /// Fetch scenarios
    Scenarios {
        #[command(flatten)]
        server: ServerArgs,
    },
    /// List the routing modes the server supports
    RoutingModes {
        #[command(flatten)]
        server: ServerArgs,
    },
    /// Calculate a route between two points
    Route {
        #[command(flatten)]
        server: ServerArgs,

        /// Origin as lon,lat
        #[arg(long, value_parser = parse_lon_lat, allow_hyphen_values = true)]
        origin: [f64; 2],

        /// Destination as lon,lat
        #[arg(long, value_parser = parse_lon_lat, allow_hyphen_values = true)]
        destination: [f64; 2],

        #[arg(long)]
        scenario: String,

        /// Comma-separated routing modes
        #[arg(long, value_delimiter = ',', required = true)]
        modes: Vec<String>,

        #[command(flatten)]
        time: TimeArgs,

        #[arg(long, default_value_t = 180)]
        max_travel_time: u32,

        #[arg(long, default_value_t = 3)]
        min_waiting_time: u32,

        #[arg(long, default_value_t = 15)]
        max_transfer_time: u32,

        #[arg(long, default_value_t = 20)]
        max_access_time: u32,

        #[arg(long, default_value_t = 30)]
        max_first_waiting_time: u32,

        /// Include pathsGeojson for each mode
        #[arg(long, default_value_t = false)]
        with_geojson: bool,

        #[arg(long, default_value_t = false)]
        with_alternatives: bool,
    },
    /// Calculate an accessibility map around a location
    Accessibility {
        #[command(flatten)]
        server: ServerArgs,

        /// Location as lon,lat
        #[arg(long, value_parser = parse_lon_lat, allow_hyphen_values = true)]
        location: [f64; 2],

        #[arg(long)]
        scenario: String,

        #[command(flatten)]
        time: TimeArgs,

        #[arg(long, default_value_t = 3)]
        polygons: u32,

        #[arg(long, default_value_t = 15)]
        delta: u32,

        #[arg(long, default_value_t = 5)]
        delta_interval: u32,

        #[arg(long, default_value_t = 30)]
        max_total_travel_time: u32,

        #[arg(long, default_value_t = 3)]
        min_waiting_time: u32,

        #[arg(long, default_value_t = 20)]
        max_access_egress_travel_time: u32,

        #[arg(long, default_value_t = 15)]
        max_transfer_travel_time: u32,

        /// Leave unset to let the server decide
        #[arg(long)]
        max_first_waiting_time: Option<u32>,

        #[arg(long, default_value_t = 5.0)]
        walking_speed_kmh: f64,

        #[arg(long, default_value_t = false)]
        with_geojson: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/transition_toolkit.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transition_toolkit.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rasterize {
            input,
            output,
            config,
            resolution,
            no_data,
            burn_value,
            exclude_no_data,
            max_latitude_span,
            keep_raster,
        } => {
            let mut config = match (config, resolution) {
                (Some(path), _) => RasterizeConfig::load(&path)?,
                (None, Some(resolution)) => RasterizeConfig::new(resolution),
                (None, None) => bail!("either --config or --resolution is required"),
            };
            if let Some(resolution) = resolution {
                config.resolution_meters = resolution;
            }
            if let Some(no_data) = no_data {
                config.no_data_value = no_data;
            }
            if let Some(burn_value) = burn_value {
                config.burn_value = burn_value;
            }
            if exclude_no_data {
                config.include_no_data = false;
            }
            if let Some(span) = max_latitude_span {
                config.max_latitude_span_degrees = span;
            }
            if keep_raster.is_some() {
                config.keep_raster = keep_raster;
            }

            let summary = pipeline::run(&input, &output, &config)
                .with_context(|| format!("rasterizing {}", input.display()))?;
            info!(
                width = summary.width_px,
                height = summary.height_px,
                burned = summary.burned_pixels,
                features = summary.features,
                "Run complete"
            );
        }
        Commands::Nodes { server } => {
            let client = connect(&server).await?;
            emit(server.output.as_deref(), &client.get_nodes().await?)?;
        }
        Commands::Paths { server } => {
            let client = connect(&server).await?;
            emit(server.output.as_deref(), &client.get_paths().await?)?;
        }
        Commands::Scenarios { server } => {
            let client = connect(&server).await?;
            emit(server.output.as_deref(), &client.get_scenarios().await?)?;
        }
        Commands::RoutingModes { server } => {
            let client = connect(&server).await?;
            let modes = client.get_routing_modes().await?;
            info!(count = modes.len(), "Routing modes fetched");
            emit(server.output.as_deref(), &modes)?;
        }
        Commands::Route {
            server,
            origin,
            destination,
            scenario,
            modes,
            time,
            max_travel_time,
            min_waiting_time,
            max_transfer_time,
            max_access_time,
            max_first_waiting_time,
            with_geojson,
            with_alternatives,
        } => {
            let client = connect(&server).await?;
            let request = RouteRequest {
                modes,
                origin,
                destination,
                scenario_id: scenario,
                time: time.trip_time(),
                max_travel_time_minutes: max_travel_time,
                min_waiting_time_minutes: min_waiting_time,
                max_transfer_time_minutes: max_transfer_time,
                max_access_time_minutes: max_access_time,
                max_first_waiting_time_minutes: max_first_waiting_time,
                with_geojson,
                with_alternatives,
            };
            emit(server.output.as_deref(), &client.request_route(&request).await?)?;
        }
        Commands::Accessibility {
            server,
            location,
            scenario,
            time,
            polygons,
            delta,
            delta_interval,
            max_total_travel_time,
            min_waiting_time,
            max_access_egress_travel_time,
            max_transfer_travel_time,
            max_first_waiting_time,
            walking_speed_kmh,
            with_geojson,
        } => {
            let client = connect(&server).await?;
            let request = AccessibilityMapRequest {
                location,
                scenario_id: scenario,
                time: time.trip_time(),
                n_polygons: polygons,
                delta_minutes: delta,
                delta_interval_minutes: delta_interval,
                max_total_travel_time_minutes: max_total_travel_time,
                min_waiting_time_minutes: min_waiting_time,
                max_access_egress_travel_time_minutes: max_access_egress_travel_time,
                max_transfer_travel_time_minutes: max_transfer_travel_time,
                max_first_waiting_time_minutes: max_first_waiting_time,
                walking_speed_kmh,
                with_geojson,
            };
            emit(
                server.output.as_deref(),
                &client.request_accessibility_map(&request).await?,
            )?;
        }
    }

    Ok(())
}

/// Builds an authenticated client from the server arguments.
#[tracing::instrument(skip_all, fields(url = %server.url))]
async fn connect(server: &ServerArgs) -> Result<TransitionClient<BasicClient>> {
    let credentials = Credentials::from_parts(
        server.username.clone(),
        server.password.clone(),
        server.token.clone(),
    )?;
    let http = BasicClient::with_default_timeouts()?;
    let client = TransitionClient::authenticate(http, &server.url, credentials).await?;
    info!(base_url = %client.base_url(), "Connected to Transition server");
    Ok(client)
}

fn parse_lon_lat(s: &str) -> Result<[f64; 2], String> {
    let (lon, lat) = s
        .split_once(',')
        .ok_or_else(|| format!("expected lon,lat, got {s:?}"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("longitude: {e}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("latitude: {e}"))?;
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("coordinates out of range: {lon},{lat}"));
    }
    Ok([lon, lat])
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| format!("expected HH:MM or HH:MM:SS, got {s:?}: {e}"))
}
