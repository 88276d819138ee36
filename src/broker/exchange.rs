//! Single-use exchange codes redeemed by relying parties.

use super::{
    identity::{Identity, Method},
    utils::generate_token,
};
use crate::{
    access::AllowList,
    ephemeral::{Expiring, Store},
};
use anyhow::Result;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct CodeRecord {
    identity: Identity,
    method: Method,
    created_at: Instant,
}

impl Expiring for CodeRecord {
    fn created_at(&self) -> Instant {
        self.created_at
    }
}

/// What a successful redemption hands back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redeemed {
    pub identity: Identity,
    pub method: Method,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejected {
    #[error("unauthorized")]
    Unauthorized,
    #[error("missing code")]
    MissingCode,
    #[error("invalid or expired code")]
    InvalidOrExpired,
}

pub struct ExchangeCodes {
    store: Store<CodeRecord>,
    allow_list: AllowList,
}

impl ExchangeCodes {
    #[must_use]
    pub fn new(ttl: Duration, allow_list: AllowList) -> Self {
        Self {
            store: Store::new("codes", ttl),
            allow_list,
        }
    }

    /// Mint a code for `identity`.
    ///
    /// # Errors
    /// Fails only when the random source does.
    pub async fn issue(&self, identity: Identity, method: Method) -> Result<String> {
        self.store.sweep().await;
        let code = generate_token()?;
        self.store
            .put(
                code.clone(),
                CodeRecord {
                    identity,
                    method,
                    created_at: Instant::now(),
                },
            )
            .await;
        debug!(%method, "issued exchange code");
        Ok(code)
    }

    /// Redeem `code` exactly once on behalf of `caller_token`.
    ///
    /// The caller is checked before the code so unauthenticated callers cannot
    /// probe for valid codes.
    ///
    /// # Errors
    /// See [`Rejected`].
    pub async fn redeem(&self, code: &str, caller_token: &str) -> Result<Redeemed, Rejected> {
        if !self.allow_list.permits(caller_token) {
            info!("exchange rejected: unknown app token");
            return Err(Rejected::Unauthorized);
        }

        if code.is_empty() {
            return Err(Rejected::MissingCode);
        }

        self.store.sweep().await;
        let record = self.store.take(code).await.ok_or_else(|| {
            info!("exchange rejected: invalid or expired code");
            Rejected::InvalidOrExpired
        })?;

        Ok(Redeemed {
            identity: record.identity,
            method: record.method,
        })
    }

    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.store.is_empty().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::identity::Subject;
    use tokio::time::advance;

    fn codes(allow: &[&str]) -> ExchangeCodes {
        ExchangeCodes::new(Duration::from_secs(60), AllowList::new(allow.iter()))
    }

    #[tokio::test]
    async fn code_redeems_exactly_once() -> anyhow::Result<()> {
        let codes = codes(&[]);
        let code = codes
            .issue(Identity::new(Subject::Numeric(42)), Method::Telegram)
            .await?;

        let redeemed = codes.redeem(&code, "").await?;
        assert_eq!(redeemed.identity.id, Subject::Numeric(42));
        assert_eq!(redeemed.method, Method::Telegram);

        assert_eq!(codes.redeem(&code, "").await, Err(Rejected::InvalidOrExpired));
        Ok(())
    }

    #[tokio::test]
    async fn allow_list_is_checked_before_code() -> anyhow::Result<()> {
        let codes = codes(&["app-1"]);
        let code = codes.issue(Identity::solana("K"), Method::Solana).await?;

        assert_eq!(codes.redeem(&code, "intruder").await, Err(Rejected::Unauthorized));
        assert_eq!(codes.redeem("", "intruder").await, Err(Rejected::Unauthorized));
        // an unauthorized attempt must not burn the code
        assert_eq!(codes.len().await, 1);

        assert!(codes.redeem(&code, "app-1").await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn empty_code_is_missing() {
        assert_eq!(codes(&[]).redeem("", "").await, Err(Rejected::MissingCode));
    }

    #[tokio::test]
    async fn unknown_code_is_invalid() {
        assert_eq!(
            codes(&[]).redeem("nope", "").await,
            Err(Rejected::InvalidOrExpired)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn code_expires_after_ttl() -> anyhow::Result<()> {
        let codes = codes(&[]);
        let code = codes.issue(Identity::solana("K"), Method::Solana).await?;
        advance(Duration::from_secs(61)).await;
        assert_eq!(codes.redeem(&code, "").await, Err(Rejected::InvalidOrExpired));
        assert!(codes.is_empty().await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn issue_sweeps_stale_codes() -> anyhow::Result<()> {
        let codes = codes(&[]);
        codes.issue(Identity::solana("A"), Method::Solana).await?;
        advance(Duration::from_secs(61)).await;
        codes.issue(Identity::solana("B"), Method::Solana).await?;
        assert_eq!(codes.len().await, 1);
        Ok(())
    }
}
