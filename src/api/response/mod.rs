pub mod battery_settings;
pub mod token;

use crate::api::error::{AuthError, SettingsError};
use crate::model;
use battery_settings::GetBatterySettings;
use std::time::Duration;
use tokio::time::Instant;
use token::TokenResponse;

const MAX_PERCENT: i64 = 100;

/// Parse body of a successful token response into a fresh `TokenState`. `expires_at` is
/// anchored at the moment the response was received, shortened by `margin`.
pub fn token_state(body: &str, margin: Duration) -> Result<model::TokenState, AuthError> {
    let response = serde_json::from_str::<TokenResponse>(body)
        .map_err(|e| AuthError::ProtocolError(e.to_string()))?;

    if response.access_token.is_empty() {
        return Err(AuthError::ProtocolError(String::from(
            "empty access_token",
        )));
    }
    if let Some(token_type) = response.token_type.as_deref() {
        if !token_type.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::ProtocolError(format!(
                "unsupported token_type {}",
                token_type
            )));
        }
    }

    let lifetime = Duration::from_secs(response.expires_in).saturating_sub(margin);
    Ok(model::TokenState {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        expires_at: Instant::now() + lifetime,
    })
}

fn percent(field: &str, value: i64) -> Result<u8, SettingsError> {
    if (0..=MAX_PERCENT).contains(&value) {
        Ok(value as u8)
    } else {
        Err(SettingsError::ProtocolError(format!(
            "{} out of range: {}",
            field, value
        )))
    }
}

/// Parse and validate body of a battery settings response.
pub fn battery_settings(body: &str) -> Result<model::BatterySettings, SettingsError> {
    let response = serde_json::from_str::<GetBatterySettings>(body)
        .map_err(|e| SettingsError::ProtocolError(e.to_string()))?;

    Ok(model::BatterySettings {
        system_id: response.system_id,
        battery_mode: response.battery_mode,
        reserve_soc: percent("reserve_soc", response.reserve_soc)?,
        energy_independence: response.energy_independence,
        charge_from_grid: response.charge_from_grid,
        battery_shutdown_level: percent(
            "battery_shutdown_level",
            response.battery_shutdown_level,
        )?,
    })
}
