//! Alert polling and notification
//!
//! Fetches the active alert set, detects changes by fingerprint, renders
//! size-bounded messages grouped by a label and hands them to a notifier.

pub mod checker;
pub mod config;
pub mod labels;
pub mod model;
pub mod notifier;
pub mod render;
pub mod source;

pub use checker::{AlertChecker, CheckerHandle, CycleReport};
pub use config::{CheckerConfig, Config, ConfigError, RenderConfig, Sink};
pub use labels::{Label, LabelSet};
pub use model::{Alert, AlertState, Fingerprint};
pub use notifier::{LogNotifier, Notifier, NotifierError, TelegramNotifier, WebhookNotifier};
pub use render::{alert_text, build_messages, render_group};
pub use source::{AlertSource, FetchError, PrometheusSource};
