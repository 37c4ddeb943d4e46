use std::sync::Mutex;

use bus_setu_lib::trip::TripId;

/// Content of the persistent "tracking in progress" indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingNotice {
    pub title: String,
    pub text: String,
    pub trip_id: TripId,
}

impl TrackingNotice {
    pub fn for_trip(trip_id: TripId) -> Self {
        Self {
            title: "BusSetu Live Tracking".to_string(),
            text: "Broadcasting your location to passengers.".to_string(),
            trip_id,
        }
    }
}

/// User-visible proof that location is being shared. Shown while the
/// reporting loop runs and not dismissable by the user.
pub trait TrackingIndicator: Send + Sync + 'static {
    fn show(&self, notice: &TrackingNotice);

    fn dismiss(&self);
}

/// Prints the indicator to the log, for hosts without a notification area.
#[derive(Default)]
pub struct LogIndicator {
    shown: Mutex<Option<TrackingNotice>>,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<TrackingNotice> {
        self.shown.lock().ok().and_then(|shown| shown.clone())
    }
}

impl TrackingIndicator for LogIndicator {
    fn show(&self, notice: &TrackingNotice) {
        tracing::info!("[{}] {} (trip {})", notice.title, notice.text, notice.trip_id);
        if let Ok(mut shown) = self.shown.lock() {
            *shown = Some(notice.clone());
        }
    }

    fn dismiss(&self) {
        if let Ok(mut shown) = self.shown.lock() {
            if shown.take().is_some() {
                tracing::info!("Tracking stopped");
            }
        }
    }
}
