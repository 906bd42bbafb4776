//! Client for the streaming service's "recently played" endpoint

use super::{Credential, ImportError, RecentlyPlayedSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SpotifyClient {
    client: Client,
    api_base: String,
    timeout: Duration,
}

impl SpotifyClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        tracing::info!(
            "Initializing streaming API client for {} (timeout {:?})",
            api_base,
            timeout
        );

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base,
            timeout,
        })
    }

    fn recently_played_url(&self) -> String {
        format!("{}/me/player/recently-played", self.api_base)
    }

    fn classify(&self, err: reqwest::Error) -> ImportError {
        if err.is_timeout() {
            ImportError::Timeout(self.timeout)
        } else {
            ImportError::Network(err)
        }
    }
}

#[async_trait]
impl RecentlyPlayedSource for SpotifyClient {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn recently_played(
        &self,
        credential: &Credential,
        limit: u32,
    ) -> Result<serde_json::Value, ImportError> {
        let url = self.recently_played_url();
        tracing::debug!("GET {} limit={}", url, limit);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, credential.header_value().clone())
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            let message = upstream_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
            tracing::error!("Recently played request failed with {}: {}", status, message);

            let status_code = status.as_u16();
            return Err(
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    ImportError::Unauthorized {
                        status: status_code,
                        message,
                    }
                } else {
                    ImportError::Upstream {
                        status: status_code,
                        message,
                    }
                },
            );
        }

        serde_json::from_str(&body)
            .map_err(|e| ImportError::InvalidResponse(format!("body is not JSON: {}", e)))
    }
}

/// Pull the human-readable message out of an error body.
///
/// API errors look like `{"error": {"status": 401, "message": "..."}}`, while
/// auth errors use `{"error": "...", "error_description": "..."}`.
fn upstream_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| value.get("error_description").and_then(|m| m.as_str()))
        .or_else(|| error.as_str())
        .map(str::to_string)
}
