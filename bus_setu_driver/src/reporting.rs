use std::{sync::Arc, time::Duration};

use bus_setu_lib::{location_fix::LocationRequest, trip::TripId};
use futures::StreamExt;
use tokio::{
    sync::watch,
    task::{JoinHandle, JoinSet},
    time::Instant,
};

use crate::{
    actor::ActorControl,
    api::TripApi,
    indicator::{TrackingIndicator, TrackingNotice},
    provider::LocationProvider,
};

/// Background location reporting as seen by the trip controller.
#[async_trait::async_trait]
pub trait LocationReporter: Send + Sync + 'static {
    /// Starts reporting for `trip_id`, or rebinds a running loop to it.
    async fn start(&self, trip_id: TripId);

    /// Stops reporting. Returns once the location subscription is released
    /// and the tracking indicator is dismissed.
    async fn stop(&self);
}

/// Long-lived actor that forwards device location fixes to the trip API.
///
/// The actor is spawned once and lives until the loop is dropped, independent
/// of which screen started it.
pub struct LocationReportingLoop {
    control: ActorControl,
    trip_id: Arc<watch::Sender<Option<TripId>>>,
    actor: JoinHandle<()>,
}

impl LocationReportingLoop {
    pub fn spawn<P, A, I>(provider: Arc<P>, api: Arc<A>, indicator: Arc<I>, request: LocationRequest) -> Self
    where
        P: LocationProvider,
        A: TripApi + ?Sized,
        I: TrackingIndicator,
    {
        let control = ActorControl::new();
        let (trip_id, trip_rx) = watch::channel(None);

        let actor = tokio::spawn(reporting_actor(
            provider,
            api,
            indicator,
            request,
            trip_rx,
            control.clone(),
        ));

        Self {
            control,
            trip_id: Arc::new(trip_id),
            actor,
        }
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    pub fn bound_trip(&self) -> Option<TripId> {
        *self.trip_id.borrow()
    }
}

impl Drop for LocationReportingLoop {
    fn drop(&mut self) {
        self.actor.abort();
    }
}

#[async_trait::async_trait]
impl LocationReporter for LocationReportingLoop {
    async fn start(&self, trip_id: TripId) {
        self.trip_id.send_replace(Some(trip_id));

        if self.control.is_running() {
            tracing::info!("Location reporting rebound to trip {}", trip_id);
        } else {
            tracing::info!("Starting location reporting for trip {}", trip_id);
            self.control.start();
        }
    }

    async fn stop(&self) {
        if !self.control.is_running() {
            return;
        }

        self.control.stop().await;
        self.trip_id.send_replace(None);
        tracing::info!("Location reporting stopped");
    }
}

async fn reporting_actor<P, A, I>(
    provider: Arc<P>,
    api: Arc<A>,
    indicator: Arc<I>,
    request: LocationRequest,
    trip_rx: watch::Receiver<Option<TripId>>,
    control: ActorControl,
) where
    P: LocationProvider,
    A: TripApi + ?Sized,
    I: TrackingIndicator,
{
    loop {
        control.wait_for_start().await;

        report_until_stopped(&*provider, &api, &*indicator, request, trip_rx.clone(), &control).await;

        control.stopped();
    }
}

async fn report_until_stopped<P, A, I>(
    provider: &P,
    api: &Arc<A>,
    indicator: &I,
    request: LocationRequest,
    mut trip_rx: watch::Receiver<Option<TripId>>,
    control: &ActorControl,
) where
    P: LocationProvider,
    A: TripApi + ?Sized,
    I: TrackingIndicator,
{
    let Some(mut trip_id) = *trip_rx.borrow_and_update() else {
        tracing::error!("Location reporting started without a trip");
        control.wait_for_stop().await;
        return;
    };

    indicator.show(&TrackingNotice::for_trip(trip_id));

    let mut fixes = match provider.subscribe(request).await {
        Ok(fixes) => fixes,
        Err(err) => {
            tracing::error!("Failed to subscribe to location updates: {err}");
            control.wait_for_stop().await;
            indicator.dismiss();
            return;
        }
    };

    let min_interval = Duration::from_millis(request.min_interval_ms);
    let mut last_sent: Option<Instant> = None;
    let mut sends = JoinSet::new();

    loop {
        tokio::select! {
            _ = control.wait_for_stop() => break,
            Ok(()) = trip_rx.changed() => {
                if let Some(rebound) = *trip_rx.borrow_and_update() {
                    trip_id = rebound;
                    indicator.show(&TrackingNotice::for_trip(trip_id));
                }
            }
            fix = fixes.next() => {
                let Some(fix) = fix else {
                    tracing::warn!("Location updates ended while reporting trip {}", trip_id);
                    control.wait_for_stop().await;
                    break;
                };

                let now = Instant::now();
                if last_sent.is_some_and(|last| now.duration_since(last) < min_interval) {
                    tracing::trace!("Dropping fix within minimum update interval");
                    continue;
                }
                last_sent = Some(now);

                tracing::debug!("Live bus location: {}, {}", fix.latitude(), fix.longitude());

                // Fire and forget, a failed send is only logged.
                let api = api.clone();
                sends.spawn(async move {
                    if let Err(err) = api.update_location(trip_id, fix.latitude(), fix.longitude()).await {
                        tracing::warn!("Failed to send location for trip {}: {err}", trip_id);
                    }
                });
            }
        }

        while sends.try_join_next().is_some() {}
    }

    sends.abort_all();
    provider.unsubscribe().await;
    indicator.dismiss();
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use bus_setu_lib::location_fix::LocationFix;

    use super::*;
    use crate::fakes::{FakeLocationProvider, FakeTripApi, RecordingIndicator};

    struct Harness {
        provider: Arc<FakeLocationProvider>,
        api: Arc<FakeTripApi>,
        indicator: Arc<RecordingIndicator>,
        reporting: LocationReportingLoop,
    }

    fn harness(request: LocationRequest) -> Harness {
        let provider = Arc::new(FakeLocationProvider::new());
        let api = Arc::new(FakeTripApi::new());
        let indicator = Arc::new(RecordingIndicator::new());
        let reporting = LocationReportingLoop::spawn(provider.clone(), api.clone(), indicator.clone(), request);

        Harness {
            provider,
            api,
            indicator,
            reporting,
        }
    }

    fn no_throttle() -> LocationRequest {
        LocationRequest {
            min_interval_ms: 0,
            ..LocationRequest::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_fixes_until_stopped() {
        let h = harness(no_throttle());

        h.reporting.start(42).await;
        settle().await;
        assert_eq!(h.provider.subscriptions.load(Ordering::SeqCst), 1);
        assert_eq!(h.indicator.current_trip(), Some(42));

        h.provider.push(LocationFix::now(18.52, 73.85));
        h.provider.push(LocationFix::now(18.53, 73.86));
        settle().await;
        assert_eq!(h.api.locations(), vec![(42, 18.52, 73.85), (42, 18.53, 73.86)]);

        h.reporting.stop().await;
        assert!(!h.reporting.is_running());
        assert_eq!(h.reporting.bound_trip(), None);
        assert_eq!(h.provider.unsubscriptions.load(Ordering::SeqCst), 1);
        assert_eq!(h.indicator.current_trip(), None);
        assert_eq!(h.indicator.dismissals.load(Ordering::SeqCst), 1);

        h.provider.push(LocationFix::now(18.54, 73.87));
        settle().await;
        assert_eq!(h.api.locations().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sends_do_not_stop_reporting() {
        let h = harness(no_throttle());
        h.api.fail_locations.store(true, Ordering::SeqCst);

        h.reporting.start(7).await;
        settle().await;
        h.provider.push(LocationFix::now(1., 1.));
        settle().await;

        h.api.fail_locations.store(false, Ordering::SeqCst);
        h.provider.push(LocationFix::now(2., 2.));
        settle().await;

        assert_eq!(h.api.location_attempts.load(Ordering::SeqCst), 2);
        assert_eq!(h.api.locations(), vec![(7, 2., 2.)]);
        assert!(h.reporting.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn drops_fixes_inside_minimum_interval() {
        let h = harness(LocationRequest {
            min_interval_ms: 2000,
            ..LocationRequest::default()
        });

        h.reporting.start(1).await;
        settle().await;

        for i in 0..5 {
            h.provider.push(LocationFix::now(i as f64, 0.));
            tokio::time::sleep(Duration::from_millis(1000)).await;
        }

        let sent: Vec<f64> = h.api.locations().into_iter().map(|(_, lat, _)| lat).collect();
        assert_eq!(sent, vec![0., 2., 4.]);
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_rebinds_without_resubscribing() {
        let h = harness(no_throttle());

        h.reporting.start(1).await;
        settle().await;
        h.reporting.start(2).await;
        settle().await;

        h.provider.push(LocationFix::now(5., 5.));
        settle().await;

        assert_eq!(h.provider.subscriptions.load(Ordering::SeqCst), 1);
        assert_eq!(h.api.locations(), vec![(2, 5., 5.)]);
        assert_eq!(h.indicator.current_trip(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn indicator_follows_start_and_stop_when_subscribe_fails() {
        let h = harness(no_throttle());
        h.provider.fail_subscribe.store(true, Ordering::SeqCst);

        h.reporting.start(42).await;
        settle().await;
        assert!(h.reporting.is_running());
        assert_eq!(h.indicator.current_trip(), Some(42));

        h.reporting.stop().await;
        assert!(!h.reporting.is_running());
        assert_eq!(h.indicator.current_trip(), None);
        assert_eq!(h.indicator.dismissals.load(Ordering::SeqCst), 1);
        assert_eq!(h.provider.unsubscriptions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_not_running_is_a_no_op() {
        let h = harness(no_throttle());

        h.reporting.stop().await;
        settle().await;

        assert_eq!(h.provider.unsubscriptions.load(Ordering::SeqCst), 0);
        assert_eq!(h.indicator.dismissals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn can_restart_after_stop() {
        let h = harness(no_throttle());

        h.reporting.start(1).await;
        settle().await;
        h.reporting.stop().await;

        h.reporting.start(3).await;
        settle().await;
        h.provider.push(LocationFix::now(9., 9.));
        settle().await;

        assert_eq!(h.provider.subscriptions.load(Ordering::SeqCst), 2);
        assert_eq!(h.api.locations(), vec![(3, 9., 9.)]);
    }
}
