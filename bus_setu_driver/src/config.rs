use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use bus_setu_lib::location_fix::LocationRequest;

use crate::{DriverError, LOG_DIR, SESSION_FILE};

pub const DEFAULT_SERVER: &str = "http://localhost:8080/";

#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub server: String,
    pub interval_ms: u64,
    pub min_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub session_file: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        let root = project_root::get_project_root().unwrap_or_else(|_| PathBuf::from("."));
        let request = LocationRequest::default();

        Self {
            server: DEFAULT_SERVER.to_string(),
            interval_ms: request.interval_ms,
            min_interval_ms: request.min_interval_ms,
            request_timeout_ms: 10_000,
            session_file: root.join(SESSION_FILE),
            log_dir: root.join(LOG_DIR),
        }
    }
}

impl Configuration {
    /// Parses `key = value` lines on top of the defaults. Lines starting with
    /// `#` are comments.
    pub fn parse(text: &str) -> Result<Self, DriverError> {
        let mut config = Self::default();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(DriverError::Config(format!("Line {}: expected key = value", number + 1)));
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "server" => config.server = value.to_string(),
                "interval_ms" => config.interval_ms = parse_number(key, value)?,
                "min_interval_ms" => config.min_interval_ms = parse_number(key, value)?,
                "request_timeout_ms" => config.request_timeout_ms = parse_number(key, value)?,
                "session_file" => config.session_file = PathBuf::from(value),
                "log_dir" => config.log_dir = PathBuf::from(value),
                _ => {
                    tracing::warn!("Unknown config key: {}", key);
                }
            }
        }

        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self, DriverError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| DriverError::Config(format!("Failed to read config file: {:?}", path)))?;
        Self::parse(&text)
    }

    pub fn location_request(&self) -> LocationRequest {
        LocationRequest {
            interval_ms: self.interval_ms,
            min_interval_ms: self.min_interval_ms,
            ..LocationRequest::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, DriverError> {
    T::from_str(value).map_err(|_| DriverError::Config(format!("Invalid value for {key}: {value}")))
}
