//! Account connect via authorization code + PKCE.

use crate::api::{ApiClient, ApiError};
use crate::platform::{PlatformError, WebAuthFlow};
use crate::settings::{PendingOAuth, SettingsError, SettingsStore};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use log::{info, warn};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use url::Url;

const STATE_LEN: usize = 32;
const VERIFIER_LEN: usize = 64;
const AUTHORIZE_PATH: &str = "/extension/oauth/authorize";

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid authorize URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("auth flow failed: {0}")]
    Flow(#[from] PlatformError),
    #[error("redirect carried no authorization code")]
    MissingCode,
    #[error("state mismatch")]
    StateMismatch,
    #[error("no connect flow in progress")]
    NotPending,
    #[error("token exchange failed: {0}")]
    Exchange(#[from] ApiError),
    #[error("token rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_state() -> String {
    random_string(STATE_LEN)
}

pub fn generate_code_verifier() -> String {
    random_string(VERIFIER_LEN)
}

/// S256 challenge: unpadded base64url of the verifier's SHA-256.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn authorize_url(
    base_url: &str,
    redirect_uri: &str,
    challenge: &str,
    state: &str,
) -> Result<Url, OAuthError> {
    let mut url = Url::parse(base_url)?.join(AUTHORIZE_PATH)?;
    url.query_pairs_mut()
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("code_challenge", challenge)
        .append_pair("state", state);
    Ok(url)
}

/// Pulls `code` and `state` out of the final redirect URL.
pub fn parse_redirect(redirect: &str) -> Result<(String, Option<String>), OAuthError> {
    let url = Url::parse(redirect)?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }
    let code = code.filter(|c| !c.is_empty()).ok_or(OAuthError::MissingCode)?;
    Ok((code, state))
}

/// Runs the full connect flow and stores the issued access token.
///
/// `client` should carry no bearer token; the exchange is anonymous. The pending
/// PKCE record is dropped whether the flow succeeds or not.
pub async fn connect(
    settings: &SettingsStore,
    client: &ApiClient,
    flow: &dyn WebAuthFlow,
) -> Result<String, OAuthError> {
    let pending = PendingOAuth {
        state: generate_state(),
        code_verifier: generate_code_verifier(),
        redirect_uri: flow.redirect_uri(),
    };
    settings.update(|p| p.pending_oauth = Some(pending.clone()))?;

    let result = finish(settings, client, flow, &pending).await;
    if let Err(e) = settings.update(|p| p.pending_oauth = None) {
        warn!("Failed to clear pending OAuth state: {}", e);
    }
    result
}

async fn finish(
    settings: &SettingsStore,
    client: &ApiClient,
    flow: &dyn WebAuthFlow,
    pending: &PendingOAuth,
) -> Result<String, OAuthError> {
    let challenge = code_challenge(&pending.code_verifier);
    let url = authorize_url(client.base_url(), &pending.redirect_uri, &challenge, &pending.state)?;
    info!("Starting account connect flow");

    let redirect = flow.launch(url.as_str()).await?;
    let (code, returned_state) = parse_redirect(&redirect)?;

    let stored = settings.load().pending_oauth.ok_or(OAuthError::NotPending)?;
    if returned_state.as_deref() != Some(stored.state.as_str()) {
        warn!("OAuth state mismatch, aborting before token exchange");
        return Err(OAuthError::StateMismatch);
    }

    let response = client
        .exchange_code(&code, &stored.code_verifier, &stored.redirect_uri)
        .await?;
    let token = match response.access_token {
        Some(token) if response.ok && !token.is_empty() => token,
        _ => {
            return Err(OAuthError::Rejected(
                response.error.unwrap_or_else(|| "no access token".to_string()),
            ))
        }
    };

    settings.update(|p| p.access_token = Some(token.clone()))?;
    info!("Account connected");
    Ok(token)
}

/// Forgets the stored access token; later calls fall back to cookies.
pub fn disconnect(settings: &SettingsStore) -> Result<(), SettingsError> {
    settings.update(|p| p.access_token = None)?;
    info!("Account disconnected");
    Ok(())
}
