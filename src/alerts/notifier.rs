//! Notification sinks

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::config::DEFAULT_HARD_LIMIT;

/// Delivers one rendered message to a destination
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: &str, body: &str) -> Result<(), NotifierError>;
}

fn check_size(body: &str, limit: usize) -> Result<(), NotifierError> {
    if body.len() > limit {
        return Err(NotifierError::Oversize {
            len: body.len(),
            limit,
        });
    }
    Ok(())
}

/// Telegram Bot API notifier; the target is a chat id
pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: String,
    api_base: String,
    hard_limit: usize,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    /// Create a notifier for the given bot
    pub fn new(
        bot_token: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            bot_token: bot_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            hard_limit: DEFAULT_HARD_LIMIT,
        })
    }

    pub fn with_hard_limit(mut self, hard_limit: usize) -> Self {
        self.hard_limit = hard_limit;
        self
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, target: &str, body: &str) -> Result<(), NotifierError> {
        check_size(body, self.hard_limit)?;

        let payload = serde_json::json!({
            "chat_id": target,
            "text": body,
            "parse_mode": "Markdown",
        });

        // The URL embeds the bot token; keep it out of errors and logs
        let response = self
            .client
            .post(self.send_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifierError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let parsed: Option<TelegramResponse> = serde_json::from_str(&text).ok();

        match parsed {
            Some(r) if r.ok && status.is_success() => {
                tracing::debug!(chat_id = %target, "Telegram message sent");
                Ok(())
            }
            Some(r) => Err(NotifierError::Rejected {
                status: status.as_u16(),
                description: r.description.unwrap_or_default(),
            }),
            None => Err(NotifierError::Rejected {
                status: status.as_u16(),
                description: text,
            }),
        }
    }
}

/// Posts messages as JSON; the target is the URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    headers: HashMap<String, String>,
    hard_limit: usize,
}

impl WebhookNotifier {
    pub fn new(headers: HashMap<String, String>, timeout: Duration) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            headers,
            hard_limit: DEFAULT_HARD_LIMIT,
        })
    }

    pub fn with_hard_limit(mut self, hard_limit: usize) -> Self {
        self.hard_limit = hard_limit;
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, target: &str, body: &str) -> Result<(), NotifierError> {
        check_size(body, self.hard_limit)?;

        let payload = serde_json::json!({
            "target": target,
            "text": body,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut request = self.client.post(target).json(&payload);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifierError::Transport(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(NotifierError::Rejected {
                status: status.as_u16(),
                description: response.text().await.unwrap_or_default(),
            });
        }

        tracing::debug!(url = %target, "Webhook notification sent");
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone)]
pub struct LogNotifier {
    hard_limit: usize,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self {
            hard_limit: DEFAULT_HARD_LIMIT,
        }
    }

    pub fn with_hard_limit(mut self, hard_limit: usize) -> Self {
        self.hard_limit = hard_limit;
        self
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, target: &str, body: &str) -> Result<(), NotifierError> {
        check_size(body, self.hard_limit)?;
        tracing::warn!(target_name = %target, "Alert notification:\n{}", body);
        Ok(())
    }
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Message too long: {len} bytes exceeds limit of {limit}")]
    Oversize { len: usize, limit: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected with status {status}: {description}")]
    Rejected { status: u16, description: String },

    #[error("Client setup failed: {0}")]
    Config(String),
}

impl From<reqwest::Error> for NotifierError {
    fn from(e: reqwest::Error) -> Self {
        NotifierError::Config(e.to_string())
    }
}
