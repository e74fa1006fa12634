use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Page size requested via `_count` on search URLs.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Hard cap on pages followed per search, against `next`-link loops.
pub const DEFAULT_MAX_PAGES: u32 = 50;
pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: u32 = 60;

/// Connection settings for the remote practice platform.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// FHIR base, without a trailing slash.
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
    pub max_requests_per_minute: u32,
    pub max_pages: u32,
}

impl RemoteConfig {
    pub fn new(
        base_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_requests_per_minute: DEFAULT_MAX_REQUESTS_PER_MINUTE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}
