use enphase_grid_charging::api::SettingsError;
use enphase_grid_charging::model::BatterySettings;
use prometheus::{Encoder, IntGaugeVec, TextEncoder};

lazy_static! {
    static ref RESERVE_SOC_GAUGE: IntGaugeVec = register_int_gauge_vec!(
        opts!(
            "battery_reserve_soc",
            "state of charge reserved for backup (in %)",
        ),
        &["system_id"],
    )
    .unwrap();
    static ref SHUTDOWN_LEVEL_GAUGE: IntGaugeVec = register_int_gauge_vec!(
        opts!(
            "battery_shutdown_level",
            "state of charge at which the battery shuts down (in %)",
        ),
        &["system_id"],
    )
    .unwrap();
    static ref CHARGE_FROM_GRID_GAUGE: IntGaugeVec = register_int_gauge_vec!(
        opts!(
            "battery_charge_from_grid",
            "1 if the battery is allowed to charge from the grid",
        ),
        &["system_id"],
    )
    .unwrap();
}

/// Feed `settings` to Prometheus gauges.
pub fn record(settings: &BatterySettings) {
    let system_id = settings.system_id.to_string();

    RESERVE_SOC_GAUGE
        .with_label_values(&[&system_id])
        .set(settings.reserve_soc.into());
    SHUTDOWN_LEVEL_GAUGE
        .with_label_values(&[&system_id])
        .set(settings.battery_shutdown_level.into());
    CHARGE_FROM_GRID_GAUGE
        .with_label_values(&[&system_id])
        .set(settings.charge_from_grid.is_enabled() as i64);
}

/// Read metrics from Prometheus exporter registry.
pub fn read() -> Result<String, SettingsError> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| SettingsError::ProtocolError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| SettingsError::ProtocolError(e.to_string()))
}
