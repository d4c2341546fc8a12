use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

type Percent = u8;

pub const MANUFACTURER: &str = "Enphase";
pub const MODEL: &str = "IQ Battery";

/// Static OAuth2 client credentials, supplied once at startup.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_code: String,
    pub redirect_uri: String,
}

/* Secrets must never end up in logs */
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Api {
    pub api_url: String,
    pub auth_url: String,
    pub api_key: String,
    pub credentials: Credentials,
    /// Upper bound for every single HTTP request, token requests included.
    pub request_timeout: Duration,
    /// Subtracted from the provider's `expires_in` so a token is renewed before the server
    /// starts rejecting it.
    pub token_expiry_margin: Duration,
}

#[derive(Clone)]
pub struct TokenState {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Instant,
}

impl TokenState {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

impl std::fmt::Debug for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenState")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Enabled,
    Disabled,
}

impl Toggle {
    pub fn is_enabled(self) -> bool {
        self == Toggle::Enabled
    }
}

impl From<bool> for Toggle {
    fn from(on: bool) -> Self {
        if on {
            Toggle::Enabled
        } else {
            Toggle::Disabled
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BatteryMode {
    SelfConsumption,
    Savings,
    FullBackup,
    /// Modes unknown to this crate are carried verbatim so they survive a write-back.
    Other(String),
}

impl BatteryMode {
    pub fn as_str(&self) -> &str {
        match self {
            BatteryMode::SelfConsumption => "Self - Consumption",
            BatteryMode::Savings => "Savings Mode",
            BatteryMode::FullBackup => "Full Backup",
            BatteryMode::Other(s) => s,
        }
    }
}

impl From<&str> for BatteryMode {
    fn from(s: &str) -> Self {
        match s {
            "Self - Consumption" => BatteryMode::SelfConsumption,
            "Savings Mode" => BatteryMode::Savings,
            "Full Backup" => BatteryMode::FullBackup,
            other => BatteryMode::Other(other.to_owned()),
        }
    }
}

impl Serialize for BatteryMode {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BatteryMode {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;

        Value::as_str(&value)
            .ok_or_else(|| serde::de::Error::custom("battery_mode is not a string"))
            .map(BatteryMode::from)
    }
}

/// Battery configuration as reported by the vendor API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatterySettings {
    pub system_id: u64,
    pub battery_mode: BatteryMode,
    pub reserve_soc: Percent,
    pub energy_independence: Toggle,
    pub charge_from_grid: Toggle,
    pub battery_shutdown_level: Percent,
}

/// Partial update of `BatterySettings`; fields left `None` are not sent and stay unchanged
/// server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatterySettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_mode: Option<BatteryMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserve_soc: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_independence: Option<Toggle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_from_grid: Option<Toggle>,
}

impl BatterySettingsUpdate {
    pub fn charge_from_grid(on: bool) -> Self {
        BatterySettingsUpdate {
            charge_from_grid: Some(on.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryInformation {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub grid_charging_time: Option<String>,
}
