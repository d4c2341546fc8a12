use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;

/// Failures of the OAuth2 token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("token request rejected: {0}")]
    InvalidGrant(String),
    #[error("token request failed: {0}")]
    NetworkFailure(String),
    #[error("unexpected token response: {0}")]
    ProtocolError(String),
    #[error("token request timed out: {0}")]
    Timeout(String),
}

/// Failures of the battery settings endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("request failed: {0}")]
    NetworkFailure(String),
    #[error("unexpected response: {0}")]
    ProtocolError(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("invalid settings: {0}")]
    ValidationError(String),
    #[error("rate limit exceeded: {0}")]
    RateExceeded(String),
    #[error("API responded {status}: {body}")]
    ApiError { status: u16, body: String },
}

impl SettingsError {
    /// Errors after which a read may be repeated once.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SettingsError::NetworkFailure(_) | SettingsError::Timeout(_)
        )
    }
}

impl From<AuthError> for SettingsError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidGrant(s) => SettingsError::Unauthorized(s),
            AuthError::NetworkFailure(s) => SettingsError::NetworkFailure(s),
            AuthError::ProtocolError(s) => SettingsError::ProtocolError(s),
            AuthError::Timeout(s) => SettingsError::Timeout(s),
        }
    }
}

impl<'r> Responder<'r, 'static> for SettingsError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = match self {
            SettingsError::Unauthorized(_) => Status::Forbidden,
            SettingsError::RateExceeded(_) => Status::TooManyRequests,
            SettingsError::Timeout(_) => Status::GatewayTimeout,
            SettingsError::ValidationError(_) => Status::UnprocessableEntity,
            _ => Status::BadGateway,
        };
        let error = format!(
            "<html><body><h3>{}</h3>Downstream API: <code>{}</code></body></html>",
            status, self
        );
        Response::build()
            .status(status)
            .sized_body(error.len(), Cursor::new(error))
            .header(ContentType::new("text", "html"))
            .ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invalid_grant_surfaces_as_unauthorized() {
        let error: SettingsError = AuthError::InvalidGrant("400".into()).into();
        assert_eq!(SettingsError::Unauthorized("400".into()), error);
    }

    #[test]
    fn timeout_stays_distinct() {
        let error: SettingsError = AuthError::Timeout("token".into()).into();
        assert!(matches!(error, SettingsError::Timeout(_)));
        assert!(error.is_transient());
        assert!(!SettingsError::Unauthorized(String::new()).is_transient());
    }
}
