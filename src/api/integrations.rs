//! Provider wiring shared by the broker handlers.

use crate::providers::{google::GoogleClient, telegram::Notifier};
use secrecy::SecretString;

#[derive(Clone, Debug)]
pub struct Integrations {
    bot_username: String,
    webhook_secret: Option<SecretString>,
    notifier: Notifier,
    google: Option<GoogleClient>,
    direct_redirect: Option<String>,
}

impl Integrations {
    #[must_use]
    pub fn new(bot_username: String, notifier: Notifier) -> Self {
        Self {
            bot_username,
            webhook_secret: None,
            notifier,
            google: None,
            direct_redirect: None,
        }
    }

    #[must_use]
    pub fn with_webhook_secret(mut self, secret: Option<SecretString>) -> Self {
        self.webhook_secret = secret;
        self
    }

    #[must_use]
    pub fn with_google(mut self, google: Option<GoogleClient>) -> Self {
        self.google = google;
        self
    }

    #[must_use]
    pub fn with_direct_redirect(mut self, direct_redirect: Option<String>) -> Self {
        self.direct_redirect = direct_redirect.filter(|target| !target.trim().is_empty());
        self
    }

    #[must_use]
    pub fn bot_username(&self) -> &str {
        &self.bot_username
    }

    #[must_use]
    pub fn webhook_secret(&self) -> Option<&SecretString> {
        self.webhook_secret.as_ref()
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    #[must_use]
    pub fn google(&self) -> Option<&GoogleClient> {
        self.google.as_ref()
    }

    #[must_use]
    pub fn direct_redirect(&self) -> Option<&str> {
        self.direct_redirect.as_deref()
    }
}
