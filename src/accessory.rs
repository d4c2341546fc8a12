use crate::api::{self, AuthError, SettingsError};
use crate::model;

/// What an accessory host needs from a grid charging switch: the `On` characteristic and the
/// accessory information service.
#[async_trait::async_trait]
pub trait GridChargingSwitch: Send + Sync {
    async fn get_status(&self) -> Result<bool, SettingsError>;
    async fn set_status(&self, on: bool) -> Result<(), SettingsError>;
    fn information(&self) -> model::AccessoryInformation;
}

pub struct EnphaseBatteryGridControl {
    name: String,
    site_id: String,
    grid_charging_time: Option<String>,
    client: api::Client,
}

impl EnphaseBatteryGridControl {
    pub fn new(
        name: String,
        site_id: String,
        grid_charging_time: Option<String>,
        client: api::Client,
    ) -> Self {
        EnphaseBatteryGridControl {
            name,
            site_id,
            grid_charging_time,
            client,
        }
    }

    /// Redeem the authorization code (or refresh a seeded token) ahead of the first request.
    pub async fn authenticate(&self) -> Result<(), AuthError> {
        self.client.tokens().get_valid_token().await.map(|_| ())
    }

    /// Full battery configuration of the configured site.
    pub async fn battery_settings(&self) -> Result<model::BatterySettings, SettingsError> {
        self.client
            .get_grid_charging_status(&self.site_id)
            .await
            .map_err(|e| {
                log::error!("Failed to read battery settings of {}: {}", self.site_id, e);
                e
            })
    }
}

#[async_trait::async_trait]
impl GridChargingSwitch for EnphaseBatteryGridControl {
    async fn get_status(&self) -> Result<bool, SettingsError> {
        self.battery_settings()
            .await
            .map(|settings| settings.charge_from_grid.is_enabled())
    }

    async fn set_status(&self, on: bool) -> Result<(), SettingsError> {
        let update = model::BatterySettingsUpdate::charge_from_grid(on);

        self.client
            .set_grid_charging_status(&self.site_id, &update)
            .await
            .map(|_| log::info!("Grid charging of {} set to {}", self.site_id, on))
            .map_err(|e| {
                log::error!("Failed to set grid charging of {}: {}", self.site_id, e);
                e
            })
    }

    fn information(&self) -> model::AccessoryInformation {
        model::AccessoryInformation {
            name: format!("{} Grid Charging", self.name),
            manufacturer: String::from(model::MANUFACTURER),
            model: String::from(model::MODEL),
            serial_number: self.site_id.to_owned(),
            grid_charging_time: self.grid_charging_time.to_owned(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn accessory() -> EnphaseBatteryGridControl {
        let credentials = model::Credentials {
            client_id: "id1".into(),
            client_secret: "secret1".into(),
            authorization_code: "abc123".into(),
            redirect_uri: api::endpoint::REDIRECT_URI.into(),
        };
        let client = api::Client::new(api::api(String::from("key"), credentials)).unwrap();
        EnphaseBatteryGridControl::new(
            "Garage".into(),
            "3419276".into(),
            Some("02:00-05:00".into()),
            client,
        )
    }

    #[test]
    fn information() {
        let info = accessory().information();
        assert_eq!("Garage Grid Charging", info.name);
        assert_eq!("Enphase", info.manufacturer);
        assert_eq!("3419276", info.serial_number);
        assert_eq!(Some("02:00-05:00".into()), info.grid_charging_time);
    }
}
