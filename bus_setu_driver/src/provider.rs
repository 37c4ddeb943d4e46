use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bus_setu_lib::location_fix::{Accuracy, LocationFix, LocationRequest};
use futures::stream::{self, BoxStream, StreamExt};

use crate::DriverError;

/// Device location source.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    async fn subscribe(&self, request: LocationRequest) -> Result<BoxStream<'static, LocationFix>, DriverError>;

    async fn unsubscribe(&self);
}

/// Drives along a polyline of waypoints, one fix per requested interval.
#[derive(Clone)]
pub struct SimulatedLocationProvider {
    waypoints: Arc<Vec<(f64, f64)>>,
    steps_per_leg: usize,
    subscribed: Arc<AtomicBool>,
}

impl SimulatedLocationProvider {
    pub fn new(waypoints: Vec<(f64, f64)>, steps_per_leg: usize) -> Self {
        Self {
            waypoints: Arc::new(waypoints),
            steps_per_leg: steps_per_leg.max(1),
            subscribed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A short loop through Pune.
    pub fn demo_route() -> Self {
        Self::new(
            vec![
                (18.5204, 73.8567),
                (18.5314, 73.8446),
                (18.5362, 73.8940),
                (18.5089, 73.9260),
                (18.5204, 73.8567),
            ],
            20,
        )
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Position after `step` fixes, wrapping around at the end of the path.
    fn position(&self, step: usize) -> (f64, f64) {
        let legs = self.waypoints.len().saturating_sub(1);
        if legs == 0 {
            return self.waypoints.first().copied().unwrap_or((0., 0.));
        }

        let step = step % (legs * self.steps_per_leg);
        let leg = step / self.steps_per_leg;
        let t = (step % self.steps_per_leg) as f64 / self.steps_per_leg as f64;

        let (lat_a, lon_a) = self.waypoints[leg];
        let (lat_b, lon_b) = self.waypoints[leg + 1];
        (lat_a + (lat_b - lat_a) * t, lon_a + (lon_b - lon_a) * t)
    }
}

#[async_trait::async_trait]
impl LocationProvider for SimulatedLocationProvider {
    async fn subscribe(&self, request: LocationRequest) -> Result<BoxStream<'static, LocationFix>, DriverError> {
        if self.waypoints.is_empty() {
            return Err(DriverError::Validation("Simulated route has no waypoints".to_string()));
        }

        if self.subscribed.swap(true, Ordering::SeqCst) {
            tracing::warn!("Location provider already had a subscriber, replacing it");
        }

        tracing::debug!(
            "Simulating {:?} accuracy fixes every {} ms",
            request.accuracy,
            request.interval_ms
        );

        let interval = tokio::time::interval(Duration::from_millis(request.interval_ms.max(1)));
        let provider = self.clone();
        let accuracy = request.accuracy;

        let fixes = stream::unfold((interval, 0usize), move |(mut interval, step)| {
            let provider = provider.clone();
            async move {
                interval.tick().await;
                let (latitude, longitude) = provider.position(step);
                let (latitude, longitude) = (coarsen(latitude, accuracy), coarsen(longitude, accuracy));
                Some((LocationFix::now(latitude, longitude), (interval, step + 1)))
            }
        });

        Ok(fixes.boxed())
    }

    async fn unsubscribe(&self) {
        self.subscribed.store(false, Ordering::SeqCst);
    }
}

/// Balanced fixes are snapped to three decimals, roughly 100 m.
fn coarsen(degrees: f64, accuracy: Accuracy) -> f64 {
    match accuracy {
        Accuracy::High => degrees,
        Accuracy::Balanced => (degrees * 1000.).round() / 1000.,
    }
}
