//! OAuth2 client-credentials token exchange

use serde::Deserialize;

use crate::error::RemoteRequestError;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub(crate) async fn fetch_token(
    http: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, RemoteRequestError> {
    let response = http
        .post(token_url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(RemoteRequestError::Token {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }

    let token: TokenResponse = response.json().await?;
    Ok(token.access_token)
}
