//! Request and response bodies of the remote trip API.

use serde::{Deserialize, Serialize};

use crate::{
    trip::{BusId, RouteId, TripId},
    user::DriverId,
};

pub const LOGIN_PATH: &str = "api/auth/login";
pub const BUSES_PATH: &str = "api/driver/buses";
pub const ROUTES_PATH: &str = "api/driver/routes";
pub const START_TRIP_PATH: &str = "api/driver/trip/start";
pub const END_TRIP_PATH: &str = "api/driver/trip/end";
pub const UPDATE_LOCATION_PATH: &str = "api/driver/location/update";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTripRequest {
    pub bus_id: BusId,
    pub route_id: RouteId,
    pub driver_id: DriverId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTripResponse {
    pub trip_id: TripId,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndTripRequest {
    pub trip_id: TripId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndTripResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLocationRequest {
    pub trip_id: TripId,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLocationResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}
