//! Bearer-token management for the remote platform.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, error};
use serde::Deserialize;
use tokio::sync::RwLock;

use clinic_sync_core::{RemoteError, Result};

/// Tokens are treated as expired this long before their real expiry so a
/// request never leaves with a token about to lapse mid-flight.
const TOKEN_EXPIRY_BUFFER_SECS: u64 = 60;
/// TTL assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Source of bearer tokens for API requests. `invalidate` drops any cached
/// token so the next `access_token` call mints a fresh one; the API client
/// uses it for its single retry after a 401.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
    async fn invalidate(&self);
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

/// Client-credentials OAuth provider with an in-memory token cache.
pub struct OAuthTokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cache: RwLock<Option<CachedToken>>,
}

impl OAuthTokenProvider {
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: RwLock::new(None),
        }
    }

    async fn fetch_token(&self) -> Result<TokenResponse> {
        debug!("[Remote] Minting access token");
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|err| RemoteError::auth(format!("token request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("[Remote] Token endpoint returned {}: {}", status, body);
            return Err(RemoteError::auth(format!(
                "token endpoint returned {status}: {body}"
            ))
            .into());
        }
        Ok(response
            .json::<TokenResponse>()
            .await
            .map_err(|err| RemoteError::auth(format!("bad token response: {err}")))?)
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn access_token(&self) -> Result<String> {
        // Fast path: check cache under a read lock.
        {
            let cache = self.cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        // Slow path: acquire write lock, double-check, then mint. The write
        // lock is held across the request to prevent concurrent mint storms.
        let mut cache = self.cache.write().await;
        if let Some(ref cached) = *cache {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let minted = self.fetch_token().await?;
        let ttl = minted
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
            .saturating_sub(TOKEN_EXPIRY_BUFFER_SECS);
        *cache = Some(CachedToken {
            token: minted.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        Ok(minted.access_token)
    }

    async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}
