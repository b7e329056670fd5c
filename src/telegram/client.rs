use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use super::Messenger;
use crate::config::Telegram;
use crate::error::Result;
use crate::retry::Backoff;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SendChatAction {
    chat_id: i64,
    action: &'static str,
}

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    config: Telegram,
    backoff: Backoff,
}

impl TelegramClient {
    /// Create a new [`TelegramClient`].
    pub fn new(config: Telegram) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http,
            config,
            backoff: Backoff::default(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_url.trim_end_matches('/'),
            self.config.token
        )
    }

    /// URL the platform must call: `<domain>/<token>`.
    pub fn webhook_url(&self) -> String {
        format!("{}/{}", self.config.domain, self.config.token)
    }

    async fn post_json<T: Serialize + Sync>(&self, method: &str, body: &T) -> Result<()> {
        self.http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Register the webhook.
    pub async fn set_webhook(&self) -> Result<()> {
        let webhook = self.webhook_url();

        self.backoff
            .retry("telegram.set_webhook", || async {
                self.http
                    .get(self.method_url("setWebhook"))
                    .query(&[("url", webhook.as_str())])
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<_, crate::error::ServerError>(())
            })
            .await?;

        tracing::info!(domain = %self.config.domain, "telegram webhook registered");
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = SendMessage { chat_id, text };
        self.backoff
            .retry("telegram.send_message", || self.post_json("sendMessage", &body))
            .await
    }

    async fn send_typing(&self, chat_id: i64) -> Result<()> {
        let body = SendChatAction {
            chat_id,
            action: "typing",
        };
        self.backoff
            .retry("telegram.send_typing", || self.post_json("sendChatAction", &body))
            .await
    }

    async fn send_document(&self, chat_id: i64, path: &Path) -> Result<()> {
        let content = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "expenses.csv".to_owned());

        self.backoff
            .retry("telegram.send_document", || async {
                let part = Part::bytes(content.clone())
                    .file_name(file_name.clone())
                    .mime_str("text/csv")?;
                let form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .part("document", part);

                self.http
                    .post(self.method_url("sendDocument"))
                    .multipart(form)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<_, crate::error::ServerError>(())
            })
            .await
    }
}
