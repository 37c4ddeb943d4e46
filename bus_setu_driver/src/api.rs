use std::time::Duration;

use bus_setu_lib::{
    comms::*,
    trip::{Bus, BusId, Route, RouteId, TripId},
    user::{DriverId, LoginRequest, LoginResponse},
};
use reqwest::{Client, Url};
use serde::{Serialize, de::DeserializeOwned};

use crate::DriverError;

/// The remote trip service.
#[async_trait::async_trait]
pub trait TripApi: Send + Sync + 'static {
    async fn login(&self, user_name: &str, password: &str) -> Result<LoginResponse, DriverError>;

    async fn available_buses(&self) -> Result<Vec<Bus>, DriverError>;

    async fn routes(&self) -> Result<Vec<Route>, DriverError>;

    /// Returns the id of the new trip.
    async fn start_trip(&self, bus_id: BusId, route_id: RouteId, driver_id: DriverId) -> Result<TripId, DriverError>;

    async fn end_trip(&self, trip_id: TripId) -> Result<(), DriverError>;

    async fn update_location(&self, trip_id: TripId, latitude: f64, longitude: f64) -> Result<(), DriverError>;
}

#[derive(Clone)]
pub struct HttpTripApi {
    client: Client,
    base_url: Url,
}

impl HttpTripApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DriverError> {
        // Relative paths only join below the base if it ends with a slash.
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        let base_url = Url::parse(&base_url)
            .map_err(|err| DriverError::Config(format!("Invalid server url {base_url}: {err}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DriverError::Config(format!("Failed to build http client: {err}")))?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, DriverError> {
        self.base_url
            .join(path)
            .map_err(|err| DriverError::Config(format!("Invalid api path {path}: {err}")))
    }

    async fn get<R>(&self, path: &str) -> Result<R, DriverError>
    where
        R: DeserializeOwned,
    {
        let response = self.client.get(self.url(path)?).send().await.map_err(transport)?;
        read_json(response).await
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, DriverError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        read_json(response).await
    }
}

async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, DriverError> {
    let status = response.status();
    if !status.is_success() {
        return Err(DriverError::Transport(format!("Server responded with {status}")));
    }

    response.json::<R>().await.map_err(transport)
}

fn transport(err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        DriverError::Transport("Request timed out".to_string())
    } else if err.is_connect() {
        DriverError::Transport("Failed to connect to server".to_string())
    } else {
        DriverError::Transport(err.to_string())
    }
}

#[async_trait::async_trait]
impl TripApi for HttpTripApi {
    async fn login(&self, user_name: &str, password: &str) -> Result<LoginResponse, DriverError> {
        let request = LoginRequest {
            user_name: user_name.to_string(),
            password: password.to_string(),
        };
        self.post(LOGIN_PATH, &request).await
    }

    async fn available_buses(&self) -> Result<Vec<Bus>, DriverError> {
        self.get(BUSES_PATH).await
    }

    async fn routes(&self) -> Result<Vec<Route>, DriverError> {
        self.get(ROUTES_PATH).await
    }

    async fn start_trip(&self, bus_id: BusId, route_id: RouteId, driver_id: DriverId) -> Result<TripId, DriverError> {
        let request = StartTripRequest {
            bus_id,
            route_id,
            driver_id,
        };
        let response: StartTripResponse = self.post(START_TRIP_PATH, &request).await?;
        tracing::debug!("Server started trip {}: {}", response.trip_id, response.message);
        Ok(response.trip_id)
    }

    async fn end_trip(&self, trip_id: TripId) -> Result<(), DriverError> {
        let response: EndTripResponse = self.post(END_TRIP_PATH, &EndTripRequest { trip_id }).await?;
        tracing::debug!("Server ended trip {}: {}", trip_id, response.message);
        Ok(())
    }

    async fn update_location(&self, trip_id: TripId, latitude: f64, longitude: f64) -> Result<(), DriverError> {
        let request = UpdateLocationRequest {
            trip_id,
            latitude,
            longitude,
        };
        let response: UpdateLocationResponse = self.post(UPDATE_LOCATION_PATH, &request).await?;

        if response.success {
            Ok(())
        } else {
            Err(DriverError::Transport(format!("Location rejected: {}", response.message)))
        }
    }
}
