pub mod endpoint;
pub mod error;
pub mod response;
pub mod token;

use crate::model;
pub use error::{AuthError, SettingsError};
use reqwest::{RequestBuilder, Response};
use std::time::Duration;
use token::TokenManager;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const READ_RETRIES: u32 = 1;

pub fn api(api_key: String, credentials: model::Credentials) -> model::Api {
    model::Api {
        api_url: String::from(endpoint::API_URL),
        auth_url: String::from(endpoint::AUTH_URL),
        api_key,
        credentials,
        request_timeout: REQUEST_TIMEOUT,
        token_expiry_margin: TOKEN_EXPIRY_MARGIN,
    }
}

fn map_transport_err(url: &str, error: reqwest::Error) -> SettingsError {
    if error.is_timeout() {
        SettingsError::Timeout(url.to_owned())
    } else {
        SettingsError::NetworkFailure(format!("{}: {}", url, error.without_url()))
    }
}

/// Map non-2xx API response to Error
fn map_api_status(status: http::StatusCode, body: String) -> SettingsError {
    match status {
        http::StatusCode::TOO_MANY_REQUESTS => SettingsError::RateExceeded(body),
        _ => SettingsError::ApiError {
            status: status.as_u16(),
            body,
        },
    }
}

/// Authenticated client of the battery settings API.
pub struct Client {
    api: model::Api,
    client: reqwest::Client,
    tokens: TokenManager,
}

impl Client {
    pub fn new(api: model::Api) -> Result<Self, SettingsError> {
        let client = reqwest::ClientBuilder::new()
            .timeout(api.request_timeout)
            .build()
            .map_err(|e| SettingsError::NetworkFailure(e.to_string()))?;
        let tokens = TokenManager::new(client.clone(), &api);

        Ok(Client {
            api,
            client,
            tokens,
        })
    }

    /// Seed the client with a token obtained earlier.
    pub fn with_token(self, state: model::TokenState) -> Self {
        Client {
            tokens: self.tokens.with_state(state),
            ..self
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    fn settings_url(&self, system_id: &str) -> String {
        format!("{}{}", self.api.api_url, endpoint::battery_settings(system_id))
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        if self.api.api_key.is_empty() {
            request
        } else {
            request.query(&[("key", self.api.api_key.as_str())])
        }
    }

    /// Send request produced by `build`, repeating it after a transport failure while
    /// `retries` allows.
    async fn send<F>(
        url: &str,
        build: &F,
        token: &str,
        retries: &mut u32,
    ) -> Result<Response, SettingsError>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        loop {
            let error = match build(token).send().await {
                Ok(response) => return Ok(response),
                Err(e) => map_transport_err(url, e),
            };
            if *retries == 0 || !error.is_transient() {
                return Err(error);
            }
            *retries -= 1;
            log::warn!("{} failed ({}), retrying once", url, error);
        }
    }

    /// Send request produced by `build` with a bearer token. A 401 answer triggers exactly one
    /// token renewal and resend; a second 401 is returned as `Unauthorized`.
    ///
    /// `retries` bounds resends after transport failures of the request itself. Token requests
    /// are never repeated here.
    async fn send_authorized<F>(
        &self,
        url: &str,
        build: F,
        mut retries: u32,
    ) -> Result<Response, SettingsError>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.tokens.get_valid_token().await?;
        let response = Self::send(url, &build, &token, &mut retries).await?;

        if response.status() != http::StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        log::warn!("{} answered 401, renewing token and retrying once", url);
        let token = self.tokens.renew_rejected(&token).await?;
        let response = Self::send(url, &build, &token, &mut retries).await?;

        if response.status() == http::StatusCode::UNAUTHORIZED {
            log::error!("{} answered 401 again after token renewal", url);
            return Err(SettingsError::Unauthorized(format!(
                "{} rejected renewed token",
                url
            )));
        }
        Ok(response)
    }

    /// Read response body, turning non-2xx status into an error.
    async fn read_body(url: &str, response: Response) -> Result<String, SettingsError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_err(url, e))?;

        if status.is_success() {
            Ok(body)
        } else {
            log::error!("{} responded {}", url, status);
            Err(map_api_status(status, body))
        }
    }

    /// Read battery configuration of `system_id`. A transport failure of the settings request
    /// is retried once.
    pub async fn get_grid_charging_status(
        &self,
        system_id: &str,
    ) -> Result<model::BatterySettings, SettingsError> {
        let url = self.settings_url(system_id);
        log::debug!("GET {}", url);

        let response = self
            .send_authorized(
                &url,
                |token| self.with_key(self.client.get(&url)).bearer_auth(token),
                READ_RETRIES,
            )
            .await?;
        let body = Self::read_body(&url, response).await?;

        response::battery_settings(&body).map_err(|e| {
            log::error!("Invalid battery settings from {}: {}", url, e);
            e
        })
    }

    /// Apply partial update `desired` to battery configuration of `system_id`.
    ///
    /// Never retried on network failure: the update may have been applied before the failure,
    /// so re-read the settings before trying again.
    pub async fn set_grid_charging_status(
        &self,
        system_id: &str,
        desired: &model::BatterySettingsUpdate,
    ) -> Result<(), SettingsError> {
        if let Some(reserve_soc) = desired.reserve_soc {
            if reserve_soc > 100 {
                return Err(SettingsError::ValidationError(format!(
                    "reserve_soc out of range: {}",
                    reserve_soc
                )));
            }
        }

        let url = self.settings_url(system_id);
        log::info!("PUT {}", url);

        let response = self
            .send_authorized(
                &url,
                |token| {
                    self.with_key(self.client.put(&url))
                        .bearer_auth(token)
                        .json(desired)
                },
                0,
            )
            .await?;
        Self::read_body(&url, response).await.map(|_| ())
    }
}
