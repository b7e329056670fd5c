//! Currency exchange rates.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::AlphaVantage;
use crate::error::{Result, ServerError};
use crate::retry::Backoff;

/// Provider of the rate converting one unit of `from` into `to`.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn exchange_rate(&self, from: &str, to: &str) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct ExchangeRateResponse {
    #[serde(rename = "Realtime Currency Exchange Rate")]
    rate: Option<HashMap<String, String>>,
}

impl ExchangeRateResponse {
    fn rate(&self) -> Option<f64> {
        self.rate
            .as_ref()?
            .get("5. Exchange Rate")?
            .trim()
            .parse()
            .ok()
    }
}

/// Alpha Vantage HTTP client.
#[derive(Clone)]
pub struct AlphaVantageClient {
    http: Client,
    config: AlphaVantage,
    backoff: Backoff,
}

impl AlphaVantageClient {
    /// Create a new [`AlphaVantageClient`].
    pub fn new(config: AlphaVantage) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            http,
            config,
            backoff: Backoff::default(),
        })
    }

    async fn query(&self, from: &str, to: &str) -> Result<f64> {
        let url = format!("{}/query", self.config.api_url.trim_end_matches('/'));

        let response: ExchangeRateResponse = self
            .http
            .get(url)
            .query(&[
                ("function", "CURRENCY_EXCHANGE_RATE"),
                ("from_currency", from),
                ("to_currency", to),
                ("apikey", self.config.token.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // the API answers 200 with a note when throttled.
        response.rate().ok_or_else(|| ServerError::RateUnavailable {
            from: from.to_owned(),
            to: to.to_owned(),
        })
    }
}

#[async_trait]
impl RateProvider for AlphaVantageClient {
    async fn exchange_rate(&self, from: &str, to: &str) -> Result<f64> {
        self.backoff
            .retry("alphavantage.exchange_rate", || self.query(from, to))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rate() {
        let payload = r#"{
            "Realtime Currency Exchange Rate": {
                "1. From_Currency Code": "SGD",
                "2. From_Currency Name": "Singapore Dollar",
                "3. To_Currency Code": "USD",
                "4. To_Currency Name": "United States Dollar",
                "5. Exchange Rate": "0.70000000",
                "6. Last Refreshed": "2018-03-12 10:00:00",
                "7. Time Zone": "UTC"
            }
        }"#;

        let response: ExchangeRateResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(response.rate(), Some(0.7));
    }

    #[test]
    fn test_throttled_response() {
        let payload = r#"{ "Note": "Thank you for using Alpha Vantage!" }"#;

        let response: ExchangeRateResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(response.rate(), None);
    }
}
