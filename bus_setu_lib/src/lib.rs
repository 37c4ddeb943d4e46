pub mod comms;
pub mod location_fix;
pub mod trip;
pub mod user;
