use serde::Deserialize;

/* POST /oauth/token */
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: Option<String>,
}
