//! Call-counting collaborators for unit tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use bus_setu_lib::{
    location_fix::{LocationFix, LocationRequest},
    trip::{Bus, BusId, Route, RouteId, TripId},
    user::{DriverId, LoginResponse},
};
use futures::{
    StreamExt,
    channel::mpsc::{UnboundedSender, unbounded},
    stream::BoxStream,
};
use tokio::sync::Notify;

use crate::{
    DriverError,
    api::TripApi,
    indicator::{TrackingIndicator, TrackingNotice},
    provider::LocationProvider,
    reporting::LocationReporter,
};

pub struct FakeTripApi {
    pub login_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub end_calls: AtomicUsize,
    pub location_attempts: AtomicUsize,
    pub fail_locations: AtomicBool,

    pub login_result: Mutex<Result<LoginResponse, DriverError>>,
    pub buses_result: Mutex<Result<Vec<Bus>, DriverError>>,
    pub routes_result: Mutex<Result<Vec<Route>, DriverError>>,
    pub start_result: Mutex<Result<TripId, DriverError>>,
    pub end_result: Mutex<Result<(), DriverError>>,

    /// When set, `start_trip` waits for a permit before answering.
    pub start_gate: Mutex<Option<Arc<Notify>>>,
    /// When set, `end_trip` waits for a permit before answering.
    pub end_gate: Mutex<Option<Arc<Notify>>>,
    pub started_with: Mutex<Vec<(BusId, RouteId, DriverId)>>,
    pub ended: Mutex<Vec<TripId>>,
    locations: Mutex<Vec<(TripId, f64, f64)>>,
}

impl FakeTripApi {
    pub fn new() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            end_calls: AtomicUsize::new(0),
            location_attempts: AtomicUsize::new(0),
            fail_locations: AtomicBool::new(false),
            login_result: Mutex::new(Ok(LoginResponse {
                id: 7,
                name: "Ravi".to_string(),
                role: "driver".to_string(),
                token: None,
            })),
            buses_result: Mutex::new(Ok(vec![Bus { id: 1, bus_number: "B1".to_string() }])),
            routes_result: Mutex::new(Ok(vec![Route { id: 101, route_name: "R1".to_string() }])),
            start_result: Mutex::new(Ok(42)),
            end_result: Mutex::new(Ok(())),
            start_gate: Mutex::new(None),
            end_gate: Mutex::new(None),
            started_with: Mutex::new(Vec::new()),
            ended: Mutex::new(Vec::new()),
            locations: Mutex::new(Vec::new()),
        }
    }

    pub fn gate_start(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn gate_end(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.end_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn locations(&self) -> Vec<(TripId, f64, f64)> {
        self.locations.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TripApi for FakeTripApi {
    async fn login(&self, _user_name: &str, _password: &str) -> Result<LoginResponse, DriverError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_result.lock().unwrap().clone()
    }

    async fn available_buses(&self) -> Result<Vec<Bus>, DriverError> {
        self.buses_result.lock().unwrap().clone()
    }

    async fn routes(&self) -> Result<Vec<Route>, DriverError> {
        self.routes_result.lock().unwrap().clone()
    }

    async fn start_trip(&self, bus_id: BusId, route_id: RouteId, driver_id: DriverId) -> Result<TripId, DriverError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.started_with.lock().unwrap().push((bus_id, route_id, driver_id));

        let gate = self.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.start_result.lock().unwrap().clone()
    }

    async fn end_trip(&self, trip_id: TripId) -> Result<(), DriverError> {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
        self.ended.lock().unwrap().push(trip_id);

        let gate = self.end_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.end_result.lock().unwrap().clone()
    }

    async fn update_location(&self, trip_id: TripId, latitude: f64, longitude: f64) -> Result<(), DriverError> {
        self.location_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_locations.load(Ordering::SeqCst) {
            return Err(DriverError::Transport("network down".to_string()));
        }
        self.locations.lock().unwrap().push((trip_id, latitude, longitude));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeReporter {
    pub starts: Mutex<Vec<TripId>>,
    pub stops: AtomicUsize,
}

impl FakeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> Vec<TripId> {
        self.starts.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LocationReporter for FakeReporter {
    async fn start(&self, trip_id: TripId) {
        self.starts.lock().unwrap().push(trip_id);
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeLocationProvider {
    pub fail_subscribe: AtomicBool,
    pub subscriptions: AtomicUsize,
    pub unsubscriptions: AtomicUsize,
    sender: Mutex<Option<UnboundedSender<LocationFix>>>,
}

impl FakeLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a fix to the current subscriber, if any.
    pub fn push(&self, fix: LocationFix) {
        if let Some(sender) = self.sender.lock().unwrap().as_ref() {
            let _ = sender.unbounded_send(fix);
        }
    }
}

#[async_trait::async_trait]
impl LocationProvider for FakeLocationProvider {
    async fn subscribe(&self, _request: LocationRequest) -> Result<BoxStream<'static, LocationFix>, DriverError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(DriverError::Validation("Location permission denied".to_string()));
        }

        let (sender, receiver) = unbounded();
        *self.sender.lock().unwrap() = Some(sender);
        Ok(receiver.boxed())
    }

    async fn unsubscribe(&self) {
        self.unsubscriptions.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().unwrap().take();
    }
}

#[derive(Default)]
pub struct RecordingIndicator {
    pub shows: AtomicUsize,
    pub dismissals: AtomicUsize,
    shown: Mutex<Option<TrackingNotice>>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_trip(&self) -> Option<TripId> {
        self.shown.lock().unwrap().as_ref().map(|notice| notice.trip_id)
    }
}

impl TrackingIndicator for RecordingIndicator {
    fn show(&self, notice: &TrackingNotice) {
        self.shows.fetch_add(1, Ordering::SeqCst);
        *self.shown.lock().unwrap() = Some(notice.clone());
    }

    fn dismiss(&self) {
        self.dismissals.fetch_add(1, Ordering::SeqCst);
        self.shown.lock().unwrap().take();
    }
}
