use serde::{Deserialize, Serialize};

use crate::user::DriverId;

pub type TripId = i64;
pub type BusId = i64;
pub type RouteId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bus {
    pub id: BusId,
    pub bus_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: RouteId,
    pub route_name: String,
}

/// The driver's pending selections before a trip is started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripConfiguration {
    pub selected_bus: Option<Bus>,
    pub selected_route: Option<Route>,
}

impl TripConfiguration {
    /// Both selections, if the trip can be started.
    pub fn selection(&self) -> Option<(&Bus, &Route)> {
        Some((self.selected_bus.as_ref()?, self.selected_route.as_ref()?))
    }
}

/// A trip confirmed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveTrip {
    pub trip_id: TripId,
    pub bus_id: BusId,
    pub route_id: RouteId,
    pub driver_id: DriverId,
}

impl ActiveTrip {
    pub fn new(trip_id: TripId, bus_id: BusId, route_id: RouteId, driver_id: DriverId) -> Self {
        Self {
            trip_id,
            bus_id,
            route_id,
            driver_id,
        }
    }
}
