use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bus_setu_lib::trip::{ActiveTrip, Bus, Route, TripConfiguration};
use tokio::sync::watch;

use crate::{DriverError, api::TripApi, reporting::LocationReporter, session::SessionStore};

pub const SELECTION_REQUIRED: &str = "Please select both a bus and a route.";
pub const DRIVER_ID_MISSING: &str = "Driver ID not found. Please log out and log in again.";
pub const DASHBOARD_LOAD_FAILED: &str = "Failed to load dashboard data. Please try again.";
pub const LOGOUT_DURING_TRIP: &str = "End the current trip before logging out.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripState {
    Idle,
    Connecting,
    Active,
    Disconnecting,
    Error(String),
}

impl TripState {
    /// Bus and route selection is frozen while a trip is starting, running or ending.
    pub fn inputs_locked(&self) -> bool {
        matches!(self, TripState::Connecting | TripState::Active | TripState::Disconnecting)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TripState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Everything the driver dashboard renders.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub state: TripState,
    pub configuration: TripConfiguration,
    pub available_buses: Vec<Bus>,
    pub available_routes: Vec<Route>,
    pub active_trip: Option<ActiveTrip>,
    pub is_loading: bool,
}

struct Inner {
    state: TripState,
    configuration: TripConfiguration,
    available_buses: Vec<Bus>,
    available_routes: Vec<Route>,
    active_trip: Option<ActiveTrip>,
    is_loading: bool,
}

/// Owns the driver's trip lifecycle.
///
/// All state changes go through the `inner` lock and are published on a watch
/// channel. Remote start and end calls are serialized by `lifecycle`, which is
/// held for the whole call, so a stop requested during a start waits for it.
pub struct TripSessionController {
    api: Arc<dyn TripApi>,
    reporter: Arc<dyn LocationReporter>,
    sessions: SessionStore,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<TripState>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl TripSessionController {
    pub fn new(api: Arc<dyn TripApi>, reporter: Arc<dyn LocationReporter>, sessions: SessionStore) -> Self {
        let (state_tx, _) = watch::channel(TripState::Idle);

        Self {
            api,
            reporter,
            sessions,
            inner: Mutex::new(Inner {
                state: TripState::Idle,
                configuration: TripConfiguration::default(),
                available_buses: Vec::new(),
                available_routes: Vec::new(),
                active_trip: None,
                is_loading: false,
            }),
            state_tx,
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> TripState {
        self.inner().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TripState> {
        self.state_tx.subscribe()
    }

    pub fn active_trip(&self) -> Option<ActiveTrip> {
        self.inner().active_trip
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let inner = self.inner();
        DashboardSnapshot {
            state: inner.state.clone(),
            configuration: inner.configuration.clone(),
            available_buses: inner.available_buses.clone(),
            available_routes: inner.available_routes.clone(),
            active_trip: inner.active_trip,
            is_loading: inner.is_loading,
        }
    }

    /// Fetches the bus and route lists for the selection dropdowns.
    pub async fn load_dashboard(&self) {
        self.inner().is_loading = true;

        let (buses, routes) = tokio::join!(self.api.available_buses(), self.api.routes());

        let mut inner = self.inner();
        inner.is_loading = false;

        match (buses, routes) {
            (Ok(buses), Ok(routes)) => {
                tracing::info!("Loaded {} buses and {} routes", buses.len(), routes.len());
                inner.available_buses = buses;
                inner.available_routes = routes;
            }
            (buses, routes) => {
                let err = buses.err().or(routes.err());
                tracing::error!("Failed to load dashboard data: {:?}", err);

                if !inner.state.inputs_locked() {
                    self.transition(&mut inner, TripState::Error(DASHBOARD_LOAD_FAILED.to_string()));
                }
            }
        }
    }

    /// Returns false if the selection is locked.
    pub fn select_bus(&self, bus: Bus) -> bool {
        self.edit_configuration(|configuration| configuration.selected_bus = Some(bus))
    }

    /// Returns false if the selection is locked.
    pub fn select_route(&self, route: Route) -> bool {
        self.edit_configuration(|configuration| configuration.selected_route = Some(route))
    }

    fn edit_configuration(&self, edit: impl FnOnce(&mut TripConfiguration)) -> bool {
        let mut inner = self.inner();

        if inner.state.inputs_locked() {
            tracing::debug!("Selection ignored while {:?}", inner.state);
            return false;
        }

        edit(&mut inner.configuration);

        if inner.state.error().is_some() {
            self.transition(&mut inner, TripState::Idle);
        }

        true
    }

    /// Clears an error and re-enables the start action.
    pub fn dismiss_error(&self) {
        let mut inner = self.inner();
        if inner.state.error().is_some() {
            self.transition(&mut inner, TripState::Idle);
        }
    }

    /// Starts a trip with the current selection. Ignored unless Idle.
    pub async fn start_trip(&self) {
        let Ok(_lifecycle) = self.lifecycle.try_lock() else {
            tracing::debug!("Start ignored, a trip call is already in flight");
            return;
        };

        let (bus_id, route_id) = {
            let mut inner = self.inner();

            if inner.state != TripState::Idle {
                tracing::debug!("Start ignored while {:?}", inner.state);
                return;
            }

            let selection = inner.configuration.selection().map(|(bus, route)| (bus.id, route.id));
            let Some(ids) = selection else {
                self.transition(&mut inner, TripState::Error(SELECTION_REQUIRED.to_string()));
                return;
            };

            self.transition(&mut inner, TripState::Connecting);
            ids
        };

        let Some(driver_id) = self.sessions.current() else {
            self.set_state(TripState::Error(DRIVER_ID_MISSING.to_string()));
            return;
        };

        match self.api.start_trip(bus_id, route_id, driver_id).await {
            Ok(trip_id) => {
                tracing::info!("Trip {} started (bus {}, route {})", trip_id, bus_id, route_id);
                self.inner().active_trip = Some(ActiveTrip::new(trip_id, bus_id, route_id, driver_id));

                self.reporter.start(trip_id).await;

                self.set_state(TripState::Active);
            }
            Err(err) => {
                tracing::error!("Failed to start trip: {err}");
                self.set_state(TripState::Error(err.to_string()));
            }
        }
    }

    /// Ends the current trip. `on_complete` runs exactly once, after location
    /// reporting has stopped, whatever the server answers.
    pub async fn stop_trip(&self, on_complete: impl FnOnce() + Send) {
        let _lifecycle = self.lifecycle.lock().await;

        let trip = {
            let mut inner = self.inner();
            let trip = inner.active_trip;
            if trip.is_some() {
                self.transition(&mut inner, TripState::Disconnecting);
            }
            trip
        };

        // Local state wins: reporting stops before the server hears about it.
        self.reporter.stop().await;

        let Some(trip) = trip else {
            let mut inner = self.inner();
            inner.active_trip = None;
            // An earlier stop may already have settled the state, keep its outcome.
            if inner.state.inputs_locked() {
                tracing::info!("No trip to end, resetting locally");
                self.transition(&mut inner, TripState::Idle);
            }
            drop(inner);

            on_complete();
            return;
        };

        let result = self.api.end_trip(trip.trip_id).await;

        {
            let mut inner = self.inner();
            inner.active_trip = None;

            match result {
                Ok(()) => {
                    tracing::info!("Trip {} ended", trip.trip_id);
                    self.transition(&mut inner, TripState::Idle);
                }
                Err(err) => {
                    tracing::error!("Trip {} ended locally, server sync failed: {err}", trip.trip_id);
                    self.transition(
                        &mut inner,
                        TripState::Error(format!("Trip ended locally, but server sync failed: {err}")),
                    );
                }
            }
        }

        on_complete();
    }

    /// Logs the driver out. Rejected while a trip is starting, running or ending.
    pub async fn logout(&self) -> Result<(), DriverError> {
        let Ok(_lifecycle) = self.lifecycle.try_lock() else {
            return Err(DriverError::Validation(LOGOUT_DURING_TRIP.to_string()));
        };

        if self.inner().state.inputs_locked() {
            return Err(DriverError::Validation(LOGOUT_DURING_TRIP.to_string()));
        }

        self.sessions.clear().await
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: TripState) {
        let mut inner = self.inner();
        self.transition(&mut inner, next);
    }

    fn transition(&self, inner: &mut Inner, next: TripState) {
        tracing::debug!("Trip state {:?} -> {:?}", inner.state, next);
        inner.state = next.clone();
        self.state_tx.send_replace(next);
    }
}
