use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Nlu, NluResponse};
use crate::config::Wit;
use crate::error::Result;
use crate::retry::Backoff;

/// Wit.ai HTTP client.
#[derive(Clone)]
pub struct WitClient {
    http: Client,
    config: Wit,
    backoff: Backoff,
}

impl WitClient {
    /// Create a new [`WitClient`].
    pub fn new(config: Wit) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            http,
            config,
            backoff: Backoff::default(),
        })
    }

    async fn message(&self, text: &str) -> Result<NluResponse> {
        let url = format!("{}/message", self.config.api_url.trim_end_matches('/'));

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.token)
            .query(&[("v", self.config.version.as_str()), ("q", text)])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Nlu for WitClient {
    async fn understand(&self, text: &str) -> NluResponse {
        match self.backoff.retry("wit.message", || self.message(text)).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "nlu unavailable, message treated as unknown");
                NluResponse::default()
            },
        }
    }
}
