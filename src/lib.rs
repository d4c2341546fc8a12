pub mod accessory;
pub mod api;
pub mod model;

pub use accessory::{EnphaseBatteryGridControl, GridChargingSwitch};
pub use api::{AuthError, Client, SettingsError};
