//! Environment-derived server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use clinic_sync_core::sync::RECONCILE_INTERVAL_SECS;

const DEFAULT_DATABASE_URL: &str = "clinic-sync.db";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Credentials for the remote practice platform. Absent when the deployment
/// has not been connected yet; the reconciler then skips its passes and
/// remote fetches fail with a clear error.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub api_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub max_requests_per_minute: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub webhook_secret: Option<String>,
    pub remote: Option<RemoteSettings>,
    pub sync_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        let bind_addr = env_trimmed("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .map_err(|err| format!("invalid BIND_ADDR {bind_addr:?}: {err}"))?;

        let remote = match (
            env_trimmed("PRACTICE_API_URL"),
            env_trimmed("PRACTICE_TOKEN_URL"),
            env_trimmed("PRACTICE_CLIENT_ID"),
            env_trimmed("PRACTICE_CLIENT_SECRET"),
        ) {
            (Some(api_url), Some(token_url), Some(client_id), Some(client_secret)) => {
                let max_requests_per_minute = match env_trimmed("PRACTICE_RATE_LIMIT") {
                    Some(raw) => raw
                        .parse()
                        .map_err(|err| format!("invalid PRACTICE_RATE_LIMIT {raw:?}: {err}"))?,
                    None => 60,
                };
                Some(RemoteSettings {
                    api_url,
                    token_url,
                    client_id,
                    client_secret,
                    max_requests_per_minute,
                })
            }
            (None, None, None, None) => None,
            _ => {
                return Err(
                    "PRACTICE_API_URL, PRACTICE_TOKEN_URL, PRACTICE_CLIENT_ID and \
                     PRACTICE_CLIENT_SECRET must be set together"
                        .to_string(),
                )
            }
        };

        let sync_interval = match env_trimmed("SYNC_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .map_err(|err| format!("invalid SYNC_INTERVAL_SECS {raw:?}: {err}"))?,
            ),
            None => Duration::from_secs(RECONCILE_INTERVAL_SECS),
        };

        Ok(Self {
            database_url: env_trimmed("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr,
            webhook_secret: env_trimmed("WEBHOOK_SECRET"),
            remote,
            sync_interval,
        })
    }
}
