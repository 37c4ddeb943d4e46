use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    StartRequested,
    Running,
    StopRequested,
}

/// Start/stop handshake between a controller and a long-lived actor task.
///
/// `stop` only returns once the actor has acknowledged with `stopped`, so the
/// actor's cleanup is complete by the time the caller continues.
#[derive(Clone)]
pub struct ActorControl {
    phase: Arc<watch::Sender<Phase>>,
}

impl Default for ActorControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorControl {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Idle);

        Self {
            phase: Arc::new(phase),
        }
    }

    /// Actor side. Resolves once a start is requested and claimed by this actor.
    pub async fn wait_for_start(&self) {
        let mut rx = self.phase.subscribe();
        loop {
            if rx.wait_for(|phase| *phase == Phase::StartRequested).await.is_err() {
                return;
            }

            // A stop may have cancelled the request before we got here.
            let claimed = self.phase.send_if_modified(|phase| {
                if *phase == Phase::StartRequested {
                    *phase = Phase::Running;
                    true
                } else {
                    false
                }
            });

            if claimed {
                return;
            }
        }
    }

    /// Actor side. Resolves once a stop is requested.
    pub async fn wait_for_stop(&self) {
        let mut rx = self.phase.subscribe();
        let _ = rx.wait_for(|phase| *phase == Phase::StopRequested).await;
    }

    /// Actor side. Acknowledges a stop.
    pub fn stopped(&self) {
        self.phase.send_replace(Phase::Idle);
    }

    pub fn start(&self) {
        self.phase.send_if_modified(|phase| {
            if *phase == Phase::Idle {
                *phase = Phase::StartRequested;
                true
            } else {
                false
            }
        });
    }

    pub async fn stop(&self) {
        self.phase.send_if_modified(|phase| match *phase {
            Phase::StartRequested => {
                *phase = Phase::Idle;
                true
            }
            Phase::Running => {
                *phase = Phase::StopRequested;
                true
            }
            Phase::Idle | Phase::StopRequested => false,
        });

        let mut rx = self.phase.subscribe();
        let _ = rx.wait_for(|phase| *phase == Phase::Idle).await;
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.phase.borrow(), Phase::StartRequested | Phase::Running)
    }
}
