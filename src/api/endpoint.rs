pub type Endpoint = str;

pub const API_URL: &str = "https://api.enphaseenergy.com";
pub const AUTH_URL: &str = "https://api.enphaseenergy.com/oauth";
pub const REDIRECT_URI: &str = "https://api.enphaseenergy.com/oauth/redirect_uri";

pub const TOKEN: &Endpoint = "/token";

/// `GET`/`PUT` battery configuration of a single system.
pub fn battery_settings(system_id: &str) -> String {
    format!("/api/v4/systems/config/{}/battery_settings", system_id)
}
