//! Trait and request types for talking to a Transition server.

use chrono::{NaiveTime, Timelike};
use serde_json::Value;

use crate::error::ClientError;

/// How a client proves its identity to the server.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Exchanged for a token through `POST /token`.
    Password { username: String, password: String },
    /// A token obtained earlier, used as is.
    Token(String),
}

impl Credentials {
    /// Picks credentials from optional parts. A complete username/password
    /// pair wins over a token; a token alone is used when neither username nor
    /// password is given.
    pub fn from_parts(
        username: Option<String>,
        password: Option<String>,
        token: Option<String>,
    ) -> Result<Self, ClientError> {
        match (username, password, token) {
            (Some(username), Some(password), _) => Ok(Credentials::Password { username, password }),
            (None, None, Some(token)) => Ok(Credentials::Token(token)),
            _ => Err(ClientError::MissingCredentials),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::Token(_) => f.write_str("Token(..)"),
        }
    }
}

/// Whether the requested time of day is a departure or an arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeChoice {
    #[default]
    Departure,
    Arrival,
}

/// Time of day anchoring a trip, split into the departure/arrival seconds
/// pair the API expects (exactly one of them set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripTime {
    pub choice: TimeChoice,
    pub time: NaiveTime,
}

impl TripTime {
    pub fn departure(time: NaiveTime) -> Self {
        Self {
            choice: TimeChoice::Departure,
            time,
        }
    }

    pub fn arrival(time: NaiveTime) -> Self {
        Self {
            choice: TimeChoice::Arrival,
            time,
        }
    }

    pub fn seconds_since_midnight(&self) -> u32 {
        self.time.num_seconds_from_midnight()
    }

    /// `(departure, arrival)` seconds since midnight.
    pub fn split(&self) -> (Option<u32>, Option<u32>) {
        let seconds = self.seconds_since_midnight();
        match self.choice {
            TimeChoice::Departure => (Some(seconds), None),
            TimeChoice::Arrival => (None, Some(seconds)),
        }
    }
}

/// Route calculation between two points, durations in minutes.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub modes: Vec<String>,
    /// `[longitude, latitude]`
    pub origin: [f64; 2],
    /// `[longitude, latitude]`
    pub destination: [f64; 2],
    pub scenario_id: String,
    pub time: TripTime,
    pub max_travel_time_minutes: u32,
    pub min_waiting_time_minutes: u32,
    pub max_transfer_time_minutes: u32,
    pub max_access_time_minutes: u32,
    pub max_first_waiting_time_minutes: u32,
    /// Ask for `pathsGeojson` in each mode's result.
    pub with_geojson: bool,
    pub with_alternatives: bool,
}

/// Accessibility map around one location, durations in minutes.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessibilityMapRequest {
    /// `[longitude, latitude]`
    pub location: [f64; 2],
    pub scenario_id: String,
    pub time: TripTime,
    pub n_polygons: u32,
    pub delta_minutes: u32,
    pub delta_interval_minutes: u32,
    pub max_total_travel_time_minutes: u32,
    pub min_waiting_time_minutes: u32,
    pub max_access_egress_travel_time_minutes: u32,
    pub max_transfer_travel_time_minutes: u32,
    /// Unset (or zero) leaves the limit to the server.
    pub max_first_waiting_time_minutes: Option<u32>,
    pub walking_speed_kmh: f64,
    pub with_geojson: bool,
}

/// Abstraction over the Transition REST API.
#[async_trait::async_trait]
pub trait TransitionApi {
    /// Transit nodes as a GeoJSON point feature collection.
    async fn get_nodes(&self) -> Result<Value, ClientError>;

    /// Transit paths as a GeoJSON line string feature collection.
    async fn get_paths(&self) -> Result<Value, ClientError>;

    /// Scenarios with their parameters.
    async fn get_scenarios(&self) -> Result<Value, ClientError>;

    async fn get_routing_modes(&self) -> Result<Vec<String>, ClientError>;

    /// Route for each requested mode.
    async fn request_route(&self, request: &RouteRequest) -> Result<Value, ClientError>;

    async fn request_accessibility_map(
        &self,
        request: &AccessibilityMapRequest,
    ) -> Result<Value, ClientError>;
}
