//! alertwatch
//!
//! Run with: cargo run -- -u http://prometheus:9090/api/v1/alerts -t TOKEN -c CHAT
//!
//! Every flag can also be set from the environment:
//! - PROMETHEUS_ALERTS_URL: Alerts endpoint to poll
//! - TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID: Telegram credentials and chat
//! - GROUP_BY: Label to group messages by (default: instance)
//! - FREQUENCY: Seconds between polls (default: 15)
//! - NOTIFY_SINK: telegram, webhook or log (default: telegram)
//! - RUST_LOG: Log level (default: info)

use alertwatch::alerts::{
    AlertChecker, Config, LogNotifier, Notifier, PrometheusSource, Sink, TelegramNotifier,
    WebhookNotifier,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alertwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    config.validate()?;

    let source = PrometheusSource::new(config.alerts_url.clone(), config.fetch_timeout())?;

    let checker_config = config.checker_config();

    // Notifiers share the rendering hard limit
    let hard_limit = checker_config.render.hard_limit;
    let notifier: Box<dyn Notifier> = match config.sink {
        Sink::Telegram => Box::new(
            TelegramNotifier::new(
                config.tg_bot_token.clone().unwrap_or_default(),
                config.telegram_api.clone(),
                config.send_timeout(),
            )?
            .with_hard_limit(hard_limit),
        ),
        Sink::Webhook => Box::new(
            WebhookNotifier::new(config.webhook_headers(), config.send_timeout())?
                .with_hard_limit(hard_limit),
        ),
        Sink::Log => Box::new(LogNotifier::new().with_hard_limit(hard_limit)),
    };

    tracing::info!("alertwatch configuration:");
    tracing::info!("  Alerts URL: {}", source.url());
    tracing::info!("  Sink: {:?}", config.sink);
    tracing::info!("  Group by: {}", config.group_by);

    let checker = AlertChecker::new(Box::new(source), notifier, checker_config);
    tracing::info!("  Poll interval: {:?}", checker.interval());

    let handle = checker.start();
    shutdown_signal().await;
    tracing::info!("Shutdown signal received");
    handle.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
