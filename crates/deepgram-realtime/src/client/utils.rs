use anyhow::Result;
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use super::config::Config;
use super::consts;

/// Build the WebSocket handshake request: streaming parameters go in the
/// query string, the API key in the authorization header.
pub fn build_request(config: &Config) -> Result<Request> {
    let url = format!(
        "{}?model={}&language={}&encoding=linear16&sample_rate={}&punctuate={}&smart_format={}&interim_results={}&endpointing={}",
        config.base_url(),
        config.model(),
        config.language(),
        config.sample_rate(),
        config.punctuate(),
        config.smart_format(),
        config.interim_results(),
        config.endpointing_ms(),
    );

    let mut request = url.into_client_request()?;
    let auth = format!("Token {}", config.api_key().expose_secret());
    request
        .headers_mut()
        .insert(consts::AUTHORIZATION_HEADER, auth.parse()?);
    Ok(request)
}
