use crate::types::Context;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 5;

#[derive(Debug)]
pub enum Error {
    InvalidToken,
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Deserialize, Clone, Debug)]
pub struct GoogleUserInfo {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Exchanges a Google access token for the holder's profile. A rejected or
/// malformed token fails the sign-in; only the transport timeout bounds the
/// request.
pub async fn fetch_user_info(ctx: Arc<Context>, access_token: String) -> Result<GoogleUserInfo> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|err| {
            tracing::error!("Failed to build http client: {}", err);
            Error::UnexpectedError
        })?;

    let response = client
        .get(ctx.google.userinfo_endpoint.clone())
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|err| {
            tracing::error!("Failed to reach Google userinfo endpoint: {}", err);
            Error::UnexpectedError
        })?;

    if !response.status().is_success() {
        tracing::warn!(
            "Google rejected the supplied access token: {}",
            response.status()
        );
        return Err(Error::InvalidToken);
    }

    response.json::<GoogleUserInfo>().await.map_err(|err| {
        tracing::error!("Failed to decode Google userinfo response: {}", err);
        Error::UnexpectedError
    })
}
