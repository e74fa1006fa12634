//! HTTP client for the remote practice platform's FHIR-shaped API.

pub mod auth;
pub mod client;
pub mod config;
pub mod fhir;
pub mod rate_limit;

pub use auth::{OAuthTokenProvider, TokenProvider};
pub use client::PracticeApiClient;
pub use config::RemoteConfig;
pub use fhir::FhirTransformer;
pub use rate_limit::{RateLimiter, SlidingWindowLimiter};
