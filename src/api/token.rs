use crate::api::endpoint;
use crate::api::error::AuthError;
use crate::api::response;
use crate::model;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::Mutex;

const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// `Authorization` header value for the token endpoint: `Basic base64(client_id:client_secret)`.
pub fn basic_authorization(credentials: &model::Credentials) -> String {
    let pair = format!("{}:{}", credentials.client_id, credentials.client_secret);
    format!("Basic {}", STANDARD.encode(pair))
}

fn map_transport_err(url: &str, error: reqwest::Error) -> AuthError {
    if error.is_timeout() {
        AuthError::Timeout(url.to_owned())
    } else {
        AuthError::NetworkFailure(format!("{}: {}", url, error.without_url()))
    }
}

#[derive(Default)]
struct Session {
    state: Option<model::TokenState>,
    /// Set as soon as an authorization code exchange is attempted. The code is single-use and
    /// a timed out exchange may still have consumed it, so it is never submitted twice.
    code_redeemed: bool,
}

/// Owns the OAuth2 token state of one set of `Credentials`.
///
/// All renewals go through a single async mutex which is held across the token request, so
/// concurrent callers wait for the renewal in flight instead of issuing their own.
pub struct TokenManager {
    client: Client,
    token_url: String,
    credentials: model::Credentials,
    expiry_margin: Duration,
    session: Mutex<Session>,
}

impl TokenManager {
    pub fn new(client: Client, api: &model::Api) -> Self {
        TokenManager {
            client,
            token_url: format!("{}{}", api.auth_url, endpoint::TOKEN),
            credentials: api.credentials.clone(),
            expiry_margin: api.token_expiry_margin,
            session: Mutex::new(Session::default()),
        }
    }

    /// Start from an already known token, e.g. one obtained by a previous process. The
    /// authorization code is considered redeemed.
    pub fn with_state(self, state: model::TokenState) -> Self {
        TokenManager {
            session: Mutex::new(Session {
                state: Some(state),
                code_redeemed: true,
            }),
            ..self
        }
    }

    async fn request(
        &self,
        grant_type: &str,
        params: &[(&str, &str)],
    ) -> Result<model::TokenState, AuthError> {
        log::debug!(
            "Requesting token from {} (grant_type={})",
            self.token_url,
            grant_type
        );

        let response = self
            .client
            .post(&self.token_url)
            .header(
                http::header::AUTHORIZATION,
                basic_authorization(&self.credentials),
            )
            .form(params)
            .send()
            .await
            .map_err(|e| map_transport_err(&self.token_url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_err(&self.token_url, e))?;

        if !status.is_success() {
            log::error!(
                "Token endpoint {} rejected {} grant with {}",
                self.token_url,
                grant_type,
                status
            );
            return Err(AuthError::InvalidGrant(format!(
                "{} ({}): {}",
                self.token_url, status, body
            )));
        }

        response::token_state(&body, self.expiry_margin).map_err(|e| {
            log::error!(
                "Invalid response from token endpoint {}: {}",
                self.token_url,
                e
            );
            e
        })
    }

    /// Exchange the authorization code for a fresh token pair.
    pub async fn acquire_token(&self) -> Result<model::TokenState, AuthError> {
        let params = [
            ("grant_type", GRANT_AUTHORIZATION_CODE),
            ("code", self.credentials.authorization_code.as_str()),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ];
        self.request(GRANT_AUTHORIZATION_CODE, &params).await
    }

    /// Trade the refresh token of `state` for a new token pair. Both tokens are replaced, as the
    /// provider rotates refresh tokens on use.
    pub async fn refresh_token(
        &self,
        state: &model::TokenState,
    ) -> Result<model::TokenState, AuthError> {
        let params = [
            ("grant_type", GRANT_REFRESH_TOKEN),
            ("refresh_token", state.refresh_token.as_str()),
        ];
        self.request(GRANT_REFRESH_TOKEN, &params).await
    }

    /// Replace the session's token, refreshing when a refresh token is cached and falling back
    /// to the authorization code otherwise. Must be called with the session locked.
    async fn renew(&self, session: &mut Session) -> Result<String, AuthError> {
        let renewed = match session.state.clone() {
            Some(state) => {
                let result = self.refresh_token(&state).await;
                if let Err(AuthError::InvalidGrant(_)) = result {
                    log::warn!("Refresh token rejected, dropping cached token");
                    session.state = None;
                }
                result?
            }
            None if session.code_redeemed => {
                return Err(AuthError::InvalidGrant(String::from(
                    "authorization code already redeemed and no refresh token available",
                )));
            }
            None => {
                session.code_redeemed = true;
                self.acquire_token().await?
            }
        };

        log::info!("Obtained new access token from {}", self.token_url);
        let access_token = renewed.access_token.clone();
        session.state = Some(renewed);
        Ok(access_token)
    }

    /// Return a non-expired access token, renewing it first if needed.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let mut session = self.session.lock().await;

        if let Some(state) = session.state.as_ref().filter(|s| !s.is_expired()) {
            return Ok(state.access_token.clone());
        }
        self.renew(&mut session).await
    }

    /// Called after the API answered 401 to `rejected`. Forces a renewal unless another caller
    /// already replaced that token, in which case the replacement is returned as is.
    pub async fn renew_rejected(&self, rejected: &str) -> Result<String, AuthError> {
        let mut session = self.session.lock().await;

        if let Some(state) = session
            .state
            .as_ref()
            .filter(|s| s.access_token != rejected && !s.is_expired())
        {
            log::debug!("Rejected token was already replaced");
            return Ok(state.access_token.clone());
        }
        self.renew(&mut session).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basic_authorization_header() {
        let credentials = model::Credentials {
            client_id: "id1".into(),
            client_secret: "secret1".into(),
            authorization_code: "abc123".into(),
            redirect_uri: endpoint::REDIRECT_URI.into(),
        };
        assert_eq!(
            "Basic aWQxOnNlY3JldDE=",
            basic_authorization(&credentials)
        );
    }
}
