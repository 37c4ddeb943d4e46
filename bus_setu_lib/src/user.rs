use serde::{Deserialize, Serialize};

pub type DriverId = i64;

/// The only role allowed to log in to the driver app.
pub const DRIVER_ROLE: &str = "driver";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id: DriverId,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl LoginResponse {
    pub fn is_driver(&self) -> bool {
        self.role == DRIVER_ROLE
    }
}
