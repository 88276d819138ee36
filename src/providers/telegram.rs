//! Telegram Bot API: webhook updates in, acknowledgement messages out.
//!
//! Messages are queued on an unbounded channel and delivered by a background
//! worker so the webhook never waits on Telegram. Delivery failures are logged
//! and dropped.

use super::ProviderError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, error, info_span, warn, Instrument};
use utoipa::ToSchema;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Upper bound for a single `sendMessage` call.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Incoming webhook payload; only the fields the broker reads.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Message {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<User>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Session token carried by a `/start <token>` deep-link command.
#[must_use]
pub fn start_token(text: &str) -> Option<&str> {
    text.trim()
        .strip_prefix("/start ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[must_use]
pub fn deep_link(bot_username: &str, token: &str) -> String {
    format!(
        "https://t.me/{}?start={token}",
        bot_username.trim_start_matches('@')
    )
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BotMessage {
    pub chat_id: i64,
    pub text: String,
}

/// Delivery backend for [`BotMessage`]s.
pub trait MessageSender: Send + Sync + 'static {
    fn send(
        &self,
        message: &BotMessage,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// Used when no bot token is configured.
#[derive(Clone, Debug)]
pub struct LogSender;

impl MessageSender for LogSender {
    async fn send(&self, message: &BotMessage) -> Result<(), ProviderError> {
        debug!(chat_id = message.chat_id, text = %message.text, "telegram send stub");
        Ok(())
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: SecretString,
}

impl TelegramClient {
    #[must_use]
    pub fn new(http: reqwest::Client, bot_token: SecretString) -> Self {
        Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            bot_token,
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// # Errors
    /// `Unreachable` on transport failure or timeout, `Rejected` on a non-2xx reply.
    pub async fn send_message(&self, message: &BotMessage) -> Result<(), ProviderError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            self.bot_token.expose_secret()
        );
        let response = self.http.post(url).json(message).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProviderError::Rejected(format!("sendMessage returned {status}")))
        }
    }
}

impl MessageSender for TelegramClient {
    async fn send(&self, message: &BotMessage) -> Result<(), ProviderError> {
        self.send_message(message).await
    }
}

/// Submission side of the acknowledgement queue.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<BotMessage>,
}

impl Notifier {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BotMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a message without waiting for delivery.
    pub fn submit(&self, chat_id: i64, text: impl Into<String>) {
        let message = BotMessage {
            chat_id,
            text: text.into(),
        };
        if self.tx.send(message).is_err() {
            warn!(chat_id, "telegram notifier worker is gone, message dropped");
        }
    }
}

/// Drain the queue until every [`Notifier`] is dropped.
///
/// Each message is delivered on its own task, so a slow `sendMessage` never
/// holds up the rest of the queue. The worker finishes once in-flight sends do.
pub fn spawn_notifier_worker<S: MessageSender>(
    sender: S,
    mut rx: mpsc::UnboundedReceiver<BotMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let sender = Arc::new(sender);
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                received = rx.recv() => {
                    let Some(message) = received else { break };
                    let sender = Arc::clone(&sender);
                    let span = info_span!("telegram.send", chat_id = message.chat_id);
                    in_flight.spawn(
                        async move {
                            if let Err(err) = sender.send(&message).await {
                                error!(chat_id = message.chat_id, "failed to deliver telegram message: {err}");
                            }
                        }
                        .instrument(span),
                    );
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }
        while in_flight.join_next().await.is_some() {}
        debug!("telegram notifier worker stopped");
    })
}
