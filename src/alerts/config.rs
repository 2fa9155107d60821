//! Configuration types
//!
//! [`Config`] is the command-line/environment surface. It is converted into
//! the explicit [`RenderConfig`] and [`CheckerConfig`] values that the rest of
//! the crate takes as parameters.

use std::collections::HashMap;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Default label used to group alerts into messages
pub const DEFAULT_GROUP_BY: &str = "instance";

/// Rendering accumulates alerts until a group body reaches this many bytes
pub const DEFAULT_SOFT_LIMIT: usize = 3500;

/// Notifiers refuse bodies longer than this many bytes
pub const DEFAULT_HARD_LIMIT: usize = 3600;

/// Rendering parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Label whose value (up to the first `:`) names a group
    pub group_by: String,
    pub soft_limit: usize,
    pub hard_limit: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            group_by: DEFAULT_GROUP_BY.to_string(),
            soft_limit: DEFAULT_SOFT_LIMIT,
            hard_limit: DEFAULT_HARD_LIMIT,
        }
    }
}

/// Parameters of the polling loop
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Destination handed to the notifier (chat id, URL, ...)
    pub target: String,
    pub render: RenderConfig,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            target: String::new(),
            render: RenderConfig::default(),
        }
    }
}

/// Where rendered messages go
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Sink {
    /// Telegram Bot API `sendMessage`
    Telegram,
    /// JSON POST to an arbitrary URL
    Webhook,
    /// Write messages to the log only
    Log,
}

/// Poll a Prometheus alerts endpoint and post changes to a chat
#[derive(Debug, Clone, Parser)]
#[command(name = "alertwatch", version, about)]
pub struct Config {
    /// Prometheus alerts URL
    #[arg(short = 'u', long = "url", env = "PROMETHEUS_ALERTS_URL")]
    pub alerts_url: String,

    /// Telegram bot token
    #[arg(
        short = 't',
        long = "tg-bot-token",
        env = "TELEGRAM_BOT_TOKEN",
        hide_env_values = true
    )]
    pub tg_bot_token: Option<String>,

    /// Telegram chat id
    #[arg(short = 'c', long = "tg-chat-id", env = "TELEGRAM_CHAT_ID")]
    pub tg_chat_id: Option<String>,

    /// Label to group summary messages
    #[arg(short = 'g', long = "group-by", env = "GROUP_BY", default_value = DEFAULT_GROUP_BY)]
    pub group_by: String,

    /// Frequency of checks in seconds
    #[arg(short = 'f', long = "frequency", env = "FREQUENCY", default_value_t = 15)]
    pub frequency_secs: u64,

    /// Notification sink
    #[arg(long, env = "NOTIFY_SINK", value_enum, default_value = "telegram")]
    pub sink: Sink,

    /// Destination for the webhook sink
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Extra webhook headers as `Name: value`, repeatable
    #[arg(long = "webhook-header", value_parser = parse_header)]
    pub webhook_headers: Vec<(String, String)>,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api: String,

    /// Timeout for fetching alerts, in seconds
    #[arg(long, env = "FETCH_TIMEOUT", default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    /// Timeout for sending one message, in seconds
    #[arg(long, env = "SEND_TIMEOUT", default_value_t = 10)]
    pub send_timeout_secs: u64,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {:?}", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl Config {
    /// Check that the chosen sink has what it needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alerts_url.trim().is_empty() {
            return Err(ConfigError::Missing("alerts URL"));
        }
        if self.frequency_secs == 0 {
            return Err(ConfigError::Invalid(
                "frequency must be at least 1 second".to_string(),
            ));
        }
        match self.sink {
            Sink::Telegram => {
                if is_blank(&self.tg_bot_token) {
                    return Err(ConfigError::Missing("Telegram bot token"));
                }
                if is_blank(&self.tg_chat_id) {
                    return Err(ConfigError::Missing("Telegram chat id"));
                }
            }
            Sink::Webhook => {
                if is_blank(&self.webhook_url) {
                    return Err(ConfigError::Missing("webhook URL"));
                }
            }
            Sink::Log => {}
        }
        Ok(())
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            group_by: self.group_by.clone(),
            ..RenderConfig::default()
        }
    }

    pub fn checker_config(&self) -> CheckerConfig {
        let target = match self.sink {
            Sink::Telegram => self.tg_chat_id.clone().unwrap_or_default(),
            Sink::Webhook => self.webhook_url.clone().unwrap_or_default(),
            Sink::Log => "log".to_string(),
        };
        CheckerConfig {
            interval: Duration::from_secs(self.frequency_secs),
            target,
            render: self.render_config(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn webhook_headers(&self) -> HashMap<String, String> {
        self.webhook_headers.iter().cloned().collect()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}
