use std::sync::Arc;

use bus_setu_lib::user::DriverId;
use futures::{Stream, stream};
use tokio::sync::{Mutex, watch};

use crate::{DriverError, store::KeyValueStore};

pub const DRIVER_ID_KEY: &str = "driver_id";

/// The first screen to show when the app opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDestination {
    Welcome,
    DriverDashboard,
}

/// Sole owner of the persisted "which driver is logged in" value.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    current: Arc<watch::Sender<Option<DriverId>>>,
    // Serializes writes so the watch value always matches the store.
    write_lock: Arc<Mutex<()>>,
}

impl SessionStore {
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, DriverError> {
        let driver_id = store.get(DRIVER_ID_KEY).await?;
        let (current, _) = watch::channel(driver_id);

        Ok(Self {
            store,
            current: Arc::new(current),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub async fn save(&self, driver_id: DriverId) -> Result<(), DriverError> {
        let _guard = self.write_lock.lock().await;
        self.store.set(DRIVER_ID_KEY, driver_id).await?;
        self.current.send_replace(Some(driver_id));
        tracing::info!("Saved session for driver {}", driver_id);
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), DriverError> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(DRIVER_ID_KEY).await?;
        self.current.send_replace(None);
        tracing::info!("Cleared driver session");
        Ok(())
    }

    pub fn current(&self) -> Option<DriverId> {
        *self.current.borrow()
    }

    /// Yields the current value, then every change. Nothing is read until the
    /// stream is polled, and every call starts a fresh stream.
    pub fn read(&self) -> impl Stream<Item = Option<DriverId>> + Send + use<> {
        let current = self.current.clone();

        stream::unfold(None, move |rx: Option<watch::Receiver<Option<DriverId>>>| {
            let current = current.clone();
            async move {
                match rx {
                    None => {
                        let mut rx = current.subscribe();
                        let value = *rx.borrow_and_update();
                        Some((value, Some(rx)))
                    }
                    Some(mut rx) => {
                        rx.changed().await.ok()?;
                        let value = *rx.borrow_and_update();
                        Some((value, Some(rx)))
                    }
                }
            }
        })
    }

    pub fn start_destination(&self) -> StartDestination {
        match self.current() {
            Some(_) => StartDestination::DriverDashboard,
            None => StartDestination::Welcome,
        }
    }
}
