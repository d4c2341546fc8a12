#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use config::Config;
use enphase_grid_charging::api::{self, endpoint, SettingsError};
use enphase_grid_charging::model::{AccessoryInformation, BatterySettings, Credentials};
use enphase_grid_charging::{EnphaseBatteryGridControl, GridChargingSwitch};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod metrics;

#[derive(Clone, Deserialize)]
pub struct EnphaseConfig {
    name: String,
    site_id: String,
    grid_charging_time: Option<String>,
    api_key: String,
    api_url: String,
    auth_url: String,
    auth_code: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    /// seconds
    request_timeout: u64,
    /// seconds
    token_expiry_margin: u64,
}

/// Structure containing state for API handlers.
pub struct StateData {
    accessory: EnphaseBatteryGridControl,
}

#[derive(Serialize, Deserialize)]
pub struct SwitchState {
    on: bool,
}

pub fn read_settings() -> Result<EnphaseConfig, config::ConfigError> {
    let mut settings = Config::default();
    settings
        .merge(config::Environment::with_prefix("ENPHASE"))?
        .set_default("name", "Battery")?
        .set_default("api_key", "")?
        .set_default("api_url", endpoint::API_URL)?
        .set_default("auth_url", endpoint::AUTH_URL)?
        .set_default("redirect_uri", endpoint::REDIRECT_URI)?
        .set_default("request_timeout", api::REQUEST_TIMEOUT.as_secs() as i64)?
        .set_default(
            "token_expiry_margin",
            api::TOKEN_EXPIRY_MARGIN.as_secs() as i64,
        )?;

    settings.try_into()
}

fn build_accessory(settings: EnphaseConfig) -> Result<EnphaseBatteryGridControl, SettingsError> {
    let credentials = Credentials {
        client_id: settings.client_id,
        client_secret: settings.client_secret,
        authorization_code: settings.auth_code,
        redirect_uri: settings.redirect_uri,
    };
    let mut api = api::api(settings.api_key, credentials);
    api.api_url = settings.api_url;
    api.auth_url = settings.auth_url;
    api.request_timeout = Duration::from_secs(settings.request_timeout);
    api.token_expiry_margin = Duration::from_secs(settings.token_expiry_margin);

    let client = api::Client::new(api)?;
    Ok(EnphaseBatteryGridControl::new(
        settings.name,
        settings.site_id,
        settings.grid_charging_time,
        client,
    ))
}

#[get("/grid-charging")]
async fn get_grid_charging_route(
    state: &State<StateData>,
) -> Result<Json<SwitchState>, SettingsError> {
    let on = state.accessory.get_status().await?;
    Ok(Json(SwitchState { on }))
}

#[put("/grid-charging", data = "<switch>")]
async fn set_grid_charging_route(
    state: &State<StateData>,
    switch: Json<SwitchState>,
) -> Result<Status, SettingsError> {
    state.accessory.set_status(switch.on).await?;
    Ok(Status::NoContent)
}

#[get("/battery-settings")]
async fn battery_settings_route(
    state: &State<StateData>,
) -> Result<Json<BatterySettings>, SettingsError> {
    let settings = state.accessory.battery_settings().await?;
    metrics::record(&settings);
    Ok(Json(settings))
}

#[get("/information")]
fn information_route(state: &State<StateData>) -> Json<AccessoryInformation> {
    Json(state.accessory.information())
}

#[get("/metrics")]
async fn metrics_route(state: &State<StateData>) -> Result<String, SettingsError> {
    match state.accessory.battery_settings().await {
        Ok(settings) => metrics::record(&settings),
        Err(e) => log::warn!("Serving stale battery metrics: {}", e),
    }
    metrics::read()
}

#[launch]
async fn rocket() -> Rocket<Build> {
    env_logger::init();

    let accessory = read_settings()
        .map_err(|e| e.to_string())
        .and_then(|settings| build_accessory(settings).map_err(|e| e.to_string()));
    let accessory = match accessory {
        Ok(accessory) => accessory,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = accessory.authenticate().await {
        log::error!("Initial authentication failed: {}", e);
    }

    rocket::build().manage(StateData { accessory }).mount(
        "/",
        routes![
            get_grid_charging_route,
            set_grid_charging_route,
            battery_settings_route,
            information_route,
            metrics_route
        ],
    )
}
