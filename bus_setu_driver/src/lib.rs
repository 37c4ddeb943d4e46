use const_format::concatcp;

pub mod actor;
pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
#[cfg(test)]
mod fakes;
pub mod indicator;
pub mod provider;
pub mod reporting;
pub mod session;
pub mod store;

pub use auth::{Authenticator, LoginState};
pub use controller::{DashboardSnapshot, TripSessionController, TripState};
pub use reporting::{LocationReporter, LocationReportingLoop};
pub use session::{SessionStore, StartDestination};

pub const DATA_DIR: &str = "data/";
pub const SESSION_FILE: &str = concatcp!(DATA_DIR, "session.json");
pub const LOG_DIR: &str = concatcp!(DATA_DIR, "log");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// Detected locally, never reaches the remote API.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Transport(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
}
