use crate::model::{BatteryMode, Toggle};
use serde::Deserialize;

/* GET /api/v4/systems/config/{system_id}/battery_settings */
#[derive(Deserialize)]
pub struct GetBatterySettings {
    pub system_id: u64,
    pub battery_mode: BatteryMode,
    pub reserve_soc: i64,
    pub energy_independence: Toggle,
    pub charge_from_grid: Toggle,
    pub battery_shutdown_level: i64,
}
