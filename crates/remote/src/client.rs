//! Authenticated, rate-limited API client for the practice platform.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use reqwest::StatusCode;
use serde_json::Value as JsonValue;

use clinic_sync_core::remote::RemoteDirectory;
use clinic_sync_core::{Error, RemoteError, Result};

use crate::auth::TokenProvider;
use crate::config::{RemoteConfig, DEFAULT_PAGE_SIZE};
use crate::fhir;
use crate::rate_limit::RateLimiter;

pub struct PracticeApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    limiter: Arc<dyn RateLimiter>,
    max_pages: u32,
}

impl PracticeApiClient {
    pub fn new(
        config: &RemoteConfig,
        tokens: Arc<dyn TokenProvider>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| RemoteError::transport(format!("could not build client: {err}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            tokens,
            limiter,
            max_pages: config.max_pages,
        })
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        self.limiter.acquire().await;
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|err| RemoteError::transport(err.to_string()))?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // One retry with a freshly minted token. A second 401 surfaces as-is.
        warn!("[Remote] 401 on {}, retrying with a fresh token", url);
        self.tokens.invalidate().await;
        let token = self.tokens.access_token().await?;
        self.limiter.acquire().await;
        Ok(self
            .http
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|err| RemoteError::transport(err.to_string()))?)
    }

    async fn get_json(&self, url: &str) -> Result<JsonValue> {
        let response = self.send(url).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::api(status.as_u16(), body).into());
        }
        Ok(response
            .json::<JsonValue>()
            .await
            .map_err(|err| RemoteError::transport(format!("bad response body: {err}")))?)
    }

    async fn get_json_optional(&self, url: &str) -> Result<Option<JsonValue>> {
        match self.get_json(url).await {
            Ok(json) => Ok(Some(json)),
            Err(Error::Remote(RemoteError::Api { status: 404, .. })) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Accumulates the resources of every page of a search, following
    /// `next` links up to the configured page cap.
    async fn fetch_all_pages(&self, first_url: String) -> Result<Vec<JsonValue>> {
        let mut resources = Vec::new();
        let mut url = first_url;
        let mut pages = 0u32;
        loop {
            pages += 1;
            if pages > self.max_pages {
                return Err(RemoteError::PaginationOverflow {
                    max_pages: self.max_pages,
                }
                .into());
            }
            let bundle = self.get_json(&url).await?;
            resources.extend(fhir::bundle_resources(&bundle));
            match fhir::next_link(&bundle) {
                Some(next) => url = next,
                None => break,
            }
        }
        debug!("[Remote] Fetched {} resource(s) over {} page(s)", resources.len(), pages);
        Ok(resources)
    }
}

#[async_trait]
impl RemoteDirectory for PracticeApiClient {
    async fn fetch_practitioner(&self, external_id: &str) -> Result<Option<JsonValue>> {
        let url = format!("{}/Practitioner/{}", self.base_url, external_id);
        self.get_json_optional(&url).await
    }

    async fn fetch_patient(&self, external_id: &str) -> Result<Option<JsonValue>> {
        let url = format!("{}/Patient/{}", self.base_url, external_id);
        self.get_json_optional(&url).await
    }

    async fn fetch_patients_for_practitioner(&self, external_id: &str) -> Result<Vec<JsonValue>> {
        let url = format!(
            "{}/Patient?generalPractitioner=Practitioner%2F{}&_count={}",
            self.base_url, external_id, DEFAULT_PAGE_SIZE
        );
        self.fetch_all_pages(url).await
    }

    async fn fetch_appointments(
        &self,
        practitioner_external_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: Option<&[&str]>,
    ) -> Result<Vec<JsonValue>> {
        let mut url = format!(
            "{}/Appointment?actor=Practitioner%2F{}&date=ge{}&date=lt{}&_count={}",
            self.base_url,
            practitioner_external_id,
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true),
            DEFAULT_PAGE_SIZE
        );
        if let Some(statuses) = statuses {
            url.push_str("&status=");
            url.push_str(&statuses.join(","));
        }
        self.fetch_all_pages(url).await
    }
}
