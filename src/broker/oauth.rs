//! OAuth `state` tokens for the Google authorization-code flow.

use super::utils::{generate_token, non_empty};
use crate::ephemeral::{Expiring, Store};
use anyhow::Result;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub struct OAuthState {
    redirect: Option<String>,
    created_at: Instant,
}

impl Expiring for OAuthState {
    fn created_at(&self) -> Instant {
        self.created_at
    }
}

pub struct OAuthStates {
    store: Store<OAuthState>,
}

impl OAuthStates {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Store::new("oauth_states", ttl),
        }
    }

    /// Remember the relying-party redirect and return the `state` to send.
    ///
    /// # Errors
    /// Fails only when the random source does.
    pub async fn create(&self, redirect: Option<String>) -> Result<String> {
        self.store.sweep().await;
        let state = generate_token()?;
        self.store
            .put(
                state.clone(),
                OAuthState {
                    redirect: non_empty(redirect),
                    created_at: Instant::now(),
                },
            )
            .await;
        Ok(state)
    }

    /// Consume a state exactly once.
    ///
    /// `None` when unknown or expired; `Some(None)` when no redirect was requested.
    pub async fn consume(&self, state: &str) -> Option<Option<String>> {
        self.store.sweep().await;
        self.store.take(state).await.map(|record| record.redirect)
    }

    pub async fn len(&self) -> usize {
        self.store.len().await
    }
}
