use crate::{
    api::{self, Integrations},
    broker::{Broker, BrokerConfig},
    cli::{
        actions::banner::{log_entries, set_or_unset},
        commands::broker::{GoogleOptions, TelegramOptions},
    },
    providers::{
        self,
        google::GoogleClient,
        telegram::{self, spawn_notifier_worker, LogSender, Notifier, TelegramClient},
    },
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// How long the acknowledgement worker gets to drain after the server stops.
const NOTIFIER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub public_base_url: String,
    pub direct_redirect: Option<String>,
    pub telegram: TelegramOptions,
    pub google: Option<GoogleOptions>,
    pub config: BrokerConfig,
    pub provider_timeout: Duration,
}

/// Execute the broker action.
/// # Errors
/// Returns an error if the HTTP clients cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let http = providers::http_client(args.provider_timeout)
        .context("Failed to build provider HTTP client")?;

    let (notifier, rx) = Notifier::channel();
    let worker = match args.telegram.bot_token {
        Some(bot_token) => {
            let send_http = providers::http_client(telegram::SEND_TIMEOUT.min(args.provider_timeout))
                .context("Failed to build Telegram HTTP client")?;
            spawn_notifier_worker(TelegramClient::new(send_http, bot_token), rx)
        }
        None => {
            warn!("no Telegram bot token configured, acknowledgements are only logged");
            spawn_notifier_worker(LogSender, rx)
        }
    };

    let google = args.google.map(|opts| {
        GoogleClient::new(
            http,
            opts.client_id,
            opts.client_secret,
            opts.callback_url,
        )
    });

    let integrations = Integrations::new(args.telegram.bot_username, notifier)
        .with_webhook_secret(args.telegram.webhook_secret)
        .with_google(google)
        .with_direct_redirect(args.direct_redirect);

    let broker = Arc::new(Broker::new(&args.config));
    let app = api::broker_app(broker, Arc::new(integrations));

    let result = api::serve(args.port, app).await;

    // the router owned every Notifier, so the worker sees a closed channel
    if tokio::time::timeout(NOTIFIER_DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("telegram notifier did not drain before shutdown");
    } else {
        info!("telegram notifier stopped");
    }

    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("public_base_url", args.public_base_url.clone()),
        (
            "direct_redirect",
            args.direct_redirect
                .clone()
                .unwrap_or_else(|| "none".to_string()),
        ),
        (
            "app_tokens",
            if args.config.app_tokens().is_empty() {
                "open".to_string()
            } else {
                args.config.app_tokens().len().to_string()
            },
        ),
        ("telegram_bot", args.telegram.bot_username.clone()),
        (
            "telegram_bot_token",
            set_or_unset(args.telegram.bot_token.is_some()),
        ),
        (
            "telegram_webhook_secret",
            set_or_unset(args.telegram.webhook_secret.is_some()),
        ),
        (
            "google_callback_url",
            args.google
                .as_ref()
                .map_or_else(|| "disabled".to_string(), |g| g.callback_url.clone()),
        ),
        (
            "session_ttl",
            format!("{}s", args.config.session_ttl().as_secs()),
        ),
        ("code_ttl", format!("{}s", args.config.code_ttl().as_secs())),
        ("nonce_ttl", format!("{}s", args.config.nonce_ttl().as_secs())),
        (
            "oauth_state_ttl",
            format!("{}s", args.config.oauth_state_ttl().as_secs()),
        ),
        (
            "provider_timeout",
            format!("{}s", args.provider_timeout.as_secs()),
        ),
    ];
    log_entries("Broker configuration", &entries);
}
