//! alertwatch: Change-Driven Alert Notifications
//!
//! Polls a Prometheus alerts endpoint on a fixed interval and, only when the
//! set of active alerts changes, posts human-readable summaries to a chat.
//!
//! # Features
//!
//! - **Change Detection**: Alert sets are fingerprinted; unchanged polls send nothing
//! - **Grouping**: One message per value of a configurable label (`instance` by default)
//! - **Bounded Messages**: Bodies stop growing at a soft limit and are clamped to a hard one
//! - **Sinks**: Telegram Bot API, generic JSON webhook, or the log
//! - **Graceful Shutdown**: The poll loop stops on a shutdown signal
//!
//! # Example
//!
//! ```no_run
//! use alertwatch::alerts::{AlertChecker, CheckerConfig, LogNotifier, PrometheusSource};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = PrometheusSource::new("http://localhost:9090/api/v1/alerts", Duration::from_secs(10))?;
//! let mut checker = AlertChecker::new(
//!     Box::new(source),
//!     Box::new(LogNotifier::new()),
//!     CheckerConfig::default(),
//! );
//!
//! let report = checker.poll_once().await;
//! println!("changed: {}, sent: {:?}", report.changed, report.sent);
//! # Ok(())
//! # }
//! ```

pub mod alerts;

// Re-export commonly used types
pub use alerts::{Alert, AlertChecker, AlertState, Config, LabelSet};
