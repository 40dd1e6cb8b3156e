use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::ClientError;
use crate::fetch::auth::ApiKey;
use crate::fetch::{HttpClient, fetch_text};
use crate::services::transition_api::{
    AccessibilityMapRequest, Credentials, RouteRequest, TransitionApi,
};

const SECONDS_PER_MINUTE: u32 = 60;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    username_or_email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteBody<'a> {
    routing_modes: &'a [String],
    with_alternatives: bool,
    origin_geojson: Value,
    destination_geojson: Value,
    scenario_id: &'a str,
    departure_time_seconds_since_midnight: Option<u32>,
    arrival_time_seconds_since_midnight: Option<u32>,
    max_total_travel_time_seconds: u32,
    min_waiting_time_seconds: u32,
    max_transfer_travel_time_seconds: u32,
    max_access_egress_travel_time_seconds: u32,
    max_first_waiting_time_seconds: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessibilityBody<'a> {
    departure_time_seconds_since_midnight: Option<u32>,
    arrival_time_seconds_since_midnight: Option<u32>,
    delta_interval_seconds: u32,
    delta_seconds: u32,
    location_geojson: Value,
    scenario_id: &'a str,
    number_of_polygons: u32,
    max_total_travel_time_seconds: u32,
    min_waiting_time_seconds: u32,
    max_access_egress_travel_time_seconds: u32,
    max_transfer_travel_time_seconds: u32,
    max_first_waiting_time_seconds: Option<u32>,
    walking_speed_mps: f64,
}

/// Point feature as the API expects it for route endpoints.
fn point_feature(coordinates: [f64; 2], id: Option<u32>) -> Value {
    let mut feature = json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": coordinates },
    });
    if let Some(id) = id {
        feature["id"] = json!(id);
    }
    feature
}

fn minutes(value: u32) -> u32 {
    value.saturating_mul(SECONDS_PER_MINUTE)
}

fn kmh_to_mps(kmh: f64) -> f64 {
    kmh * 1000.0 / 3600.0
}

fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ClientError::InvalidUrl("URL is empty".to_string()));
    }
    Url::parse(trimmed).map_err(|e| ClientError::InvalidUrl(format!("{trimmed}: {e}")))
}

fn endpoint(base: &Url, path: &str) -> Result<Url, ClientError> {
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| ClientError::InvalidUrl(format!("{joined}: {e}")))
}

fn json_request<T: Serialize>(method: Method, url: Url, body: &T) -> Result<Request, ClientError> {
    let mut req = Request::new(method, url);
    req.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());
    Ok(req)
}

/// Client for a Transition server, authenticated with a bearer token.
pub struct TransitionClient<C> {
    base_url: Url,
    token: String,
    http: ApiKey<C>,
}

impl<C: HttpClient> TransitionClient<C> {
    /// Resolves `credentials` into a token and returns a ready client.
    ///
    /// A username/password pair is exchanged through `POST {base_url}/token`;
    /// a token is used as given.
    pub async fn authenticate(
        http: C,
        base_url: &str,
        credentials: Credentials,
    ) -> Result<Self, ClientError> {
        let base_url = parse_base_url(base_url)?;
        let token = match credentials {
            Credentials::Password { username, password } => {
                Self::exchange_token(&http, &base_url, &username, &password).await?
            }
            Credentials::Token(token) => token,
        };
        Self::from_parts(http, base_url, token)
    }

    /// Builds a client from a token obtained earlier.
    pub fn with_token(http: C, base_url: &str, token: impl Into<String>) -> Result<Self, ClientError> {
        Self::from_parts(http, parse_base_url(base_url)?, token.into())
    }

    fn from_parts(http: C, base_url: Url, token: String) -> Result<Self, ClientError> {
        let token = token.trim().to_string();
        let http = ApiKey::bearer(http, &token)?;
        Ok(Self {
            base_url,
            token,
            http,
        })
    }

    async fn exchange_token(
        http: &C,
        base_url: &Url,
        username: &str,
        password: &str,
    ) -> Result<String, ClientError> {
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::MissingCredentials);
        }
        let body = TokenRequest {
            username_or_email: username,
            password,
        };
        let req = json_request(Method::POST, endpoint(base_url, "token")?, &body)?;
        let token = fetch_text(http, req).await?.trim().to_string();
        if token.is_empty() {
            return Err(ClientError::InvalidToken);
        }
        info!(username, "Token obtained");
        Ok(token)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let req = Request::new(Method::GET, endpoint(&self.base_url, path)?);
        let body = fetch_text(&self.http, req).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        path: &str,
        with_geojson: bool,
        body: &T,
    ) -> Result<Value, ClientError> {
        let mut url = endpoint(&self.base_url, path)?;
        url.query_pairs_mut()
            .append_pair("withGeojson", if with_geojson { "true" } else { "false" });
        let req = json_request(Method::POST, url, body)?;
        let body = fetch_text(&self.http, req).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl<C: HttpClient> TransitionApi for TransitionClient<C> {
    #[tracing::instrument(skip_all)]
    async fn get_nodes(&self) -> Result<Value, ClientError> {
        self.get_json("api/v1/nodes").await
    }

    #[tracing::instrument(skip_all)]
    async fn get_paths(&self) -> Result<Value, ClientError> {
        self.get_json("api/v1/paths").await
    }

    #[tracing::instrument(skip_all)]
    async fn get_scenarios(&self) -> Result<Value, ClientError> {
        self.get_json("api/v1/scenarios").await
    }

    #[tracing::instrument(skip_all)]
    async fn get_routing_modes(&self) -> Result<Vec<String>, ClientError> {
        let modes = self.get_json("api/v1/routing-modes").await?;
        Ok(serde_json::from_value(modes)?)
    }

    #[tracing::instrument(skip_all, fields(scenario = %request.scenario_id))]
    async fn request_route(&self, request: &RouteRequest) -> Result<Value, ClientError> {
        let (departure, arrival) = request.time.split();
        let body = RouteBody {
            routing_modes: &request.modes,
            with_alternatives: request.with_alternatives,
            origin_geojson: point_feature(request.origin, Some(1)),
            destination_geojson: point_feature(request.destination, Some(1)),
            scenario_id: &request.scenario_id,
            departure_time_seconds_since_midnight: departure,
            arrival_time_seconds_since_midnight: arrival,
            max_total_travel_time_seconds: minutes(request.max_travel_time_minutes),
            min_waiting_time_seconds: minutes(request.min_waiting_time_minutes),
            max_transfer_travel_time_seconds: minutes(request.max_transfer_time_minutes),
            max_access_egress_travel_time_seconds: minutes(request.max_access_time_minutes),
            max_first_waiting_time_seconds: minutes(request.max_first_waiting_time_minutes),
        };
        debug!(modes = ?request.modes, "Requesting route");
        self.post_json("api/v1/route", request.with_geojson, &body)
            .await
    }

    #[tracing::instrument(skip_all, fields(scenario = %request.scenario_id))]
    async fn request_accessibility_map(
        &self,
        request: &AccessibilityMapRequest,
    ) -> Result<Value, ClientError> {
        let (departure, arrival) = request.time.split();
        let body = AccessibilityBody {
            departure_time_seconds_since_midnight: departure,
            arrival_time_seconds_since_midnight: arrival,
            delta_interval_seconds: minutes(request.delta_interval_minutes),
            delta_seconds: minutes(request.delta_minutes),
            location_geojson: point_feature(request.location, None),
            scenario_id: &request.scenario_id,
            number_of_polygons: request.n_polygons,
            max_total_travel_time_seconds: minutes(request.max_total_travel_time_minutes),
            min_waiting_time_seconds: minutes(request.min_waiting_time_minutes),
            max_access_egress_travel_time_seconds: minutes(
                request.max_access_egress_travel_time_minutes,
            ),
            max_transfer_travel_time_seconds: minutes(request.max_transfer_travel_time_minutes),
            max_first_waiting_time_seconds: request
                .max_first_waiting_time_minutes
                .filter(|m| *m > 0)
                .map(minutes),
            walking_speed_mps: kmh_to_mps(request.walking_speed_kmh),
        };
        debug!(polygons = request.n_polygons, "Requesting accessibility map");
        self.post_json("api/v1/accessibility", request.with_geojson, &body)
            .await
    }
}
