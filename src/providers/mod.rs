//! Outbound calls to identity providers.
//!
//! Every client is built from [`http_client`], which bounds each request with
//! the configured provider timeout. Failures are never retried here; the
//! browser or the bot user retries.

pub mod google;
pub mod telegram;

use anyhow::{Context, Result};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Rejected(format!("invalid response: {err}"))
        } else {
            Self::Unreachable(err)
        }
    }
}

/// Build the HTTP client used for provider calls.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .timeout(timeout)
        .build()
        .context("failed to build provider HTTP client")
}
