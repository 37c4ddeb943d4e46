use std::sync::Arc;

use bus_setu_lib::user::DriverId;
use tokio::sync::watch;

use crate::{DriverError, api::TripApi, session::SessionStore};

pub const CREDENTIALS_REQUIRED: &str = "Please enter both username and password";
pub const DRIVERS_ONLY: &str = "Access denied. Only drivers can log in here.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    Loading,
    Success,
    Error(String),
}

/// Driver login. A session is only saved for accounts with the driver role.
pub struct Authenticator {
    api: Arc<dyn TripApi>,
    sessions: SessionStore,
    state: watch::Sender<LoginState>,
}

impl Authenticator {
    pub fn new(api: Arc<dyn TripApi>, sessions: SessionStore) -> Self {
        let (state, _) = watch::channel(LoginState::Idle);
        Self { api, sessions, state }
    }

    pub fn state(&self) -> LoginState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    pub async fn login(&self, user_name: &str, password: &str) -> Result<DriverId, DriverError> {
        let result = self.try_login(user_name, password).await;

        match &result {
            Ok(driver_id) => {
                tracing::info!("Driver {} logged in", driver_id);
                self.state.send_replace(LoginState::Success);
            }
            Err(err) => {
                tracing::warn!("Login failed: {err}");
                self.state.send_replace(LoginState::Error(err.to_string()));
            }
        }

        result
    }

    async fn try_login(&self, user_name: &str, password: &str) -> Result<DriverId, DriverError> {
        if user_name.trim().is_empty() || password.trim().is_empty() {
            return Err(DriverError::Validation(CREDENTIALS_REQUIRED.to_string()));
        }

        self.state.send_replace(LoginState::Loading);

        let response = self.api.login(user_name, password).await?;

        if !response.is_driver() {
            return Err(DriverError::Unauthorized(DRIVERS_ONLY.to_string()));
        }

        self.sessions.save(response.id).await?;

        Ok(response.id)
    }

    /// Clears a shown error so it is not shown again.
    pub fn reset(&self) {
        self.state.send_if_modified(|state| {
            if matches!(state, LoginState::Error(_)) {
                *state = LoginState::Idle;
                true
            } else {
                false
            }
        });
    }
}
