//! QR login sessions: `pending` until the bot webhook authenticates them.

use super::{
    exchange::ExchangeCodes,
    identity::{Identity, Method},
    utils::{generate_token, non_empty},
};
use crate::ephemeral::{Expiring, Slot, Store};
use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Authenticated,
}

#[derive(Clone, Debug)]
pub struct LoginSession {
    status: Status,
    identity: Option<Identity>,
    redirect: Option<String>,
    exchange_code: Option<String>,
    created_at: Instant,
}

impl Expiring for LoginSession {
    fn created_at(&self) -> Instant {
        self.created_at
    }
}

/// Snapshot returned to pollers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionView {
    pub status: Status,
    pub identity: Option<Identity>,
    pub exchange_code: Option<String>,
    pub redirect: Option<String>,
}

impl From<LoginSession> for SessionView {
    fn from(session: LoginSession) -> Self {
        // code and redirect are only disclosed once the session is authenticated
        let authenticated = session.status == Status::Authenticated;
        Self {
            status: session.status,
            identity: session.identity,
            exchange_code: session.exchange_code.filter(|_| authenticated),
            redirect: session.redirect.filter(|_| authenticated),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The session moved to `authenticated`; carries the minted code, if any.
    Authenticated { exchange_code: Option<String> },
    AlreadyAuthenticated,
    /// Known token past its TTL; the record has been evicted.
    Expired,
    Unknown,
}

pub struct LoginSessions {
    store: Store<LoginSession>,
}

impl LoginSessions {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Store::new("sessions", ttl),
        }
    }

    /// Start a pending session and return its token.
    ///
    /// # Errors
    /// Fails only when the random source does.
    pub async fn create(&self, redirect: Option<String>) -> Result<String> {
        self.store.sweep().await;
        let token = generate_token()?;
        self.store
            .put(
                token.clone(),
                LoginSession {
                    status: Status::Pending,
                    identity: None,
                    redirect: non_empty(redirect),
                    exchange_code: None,
                    created_at: Instant::now(),
                },
            )
            .await;
        debug!("created login session");
        Ok(token)
    }

    /// `None` when the token is unknown or past its TTL.
    pub async fn poll(&self, token: &str) -> Option<SessionView> {
        self.store.get(token).await.map(SessionView::from)
    }

    /// Move a pending session to `authenticated`.
    ///
    /// Runs entirely under the session lock, so duplicate deliveries of the
    /// same event observe `AlreadyAuthenticated` and never mint a second code.
    /// The code store is locked after the session store, never before.
    ///
    /// # Errors
    /// Fails only when minting the exchange code fails; the session is left
    /// pending in that case.
    pub async fn authenticate(
        &self,
        token: &str,
        identity: Identity,
        method: Method,
        codes: &ExchangeCodes,
    ) -> Result<AuthOutcome> {
        let mut entries = self.store.lock().await;
        let session = match entries.entry(token) {
            Slot::Live(session) => session,
            Slot::Expired => {
                info!("authentication for expired session");
                return Ok(AuthOutcome::Expired);
            }
            Slot::Absent => return Ok(AuthOutcome::Unknown),
        };

        if session.status == Status::Authenticated {
            debug!("session already authenticated");
            return Ok(AuthOutcome::AlreadyAuthenticated);
        }

        let exchange_code = match session.redirect {
            Some(_) => Some(codes.issue(identity.clone(), method).await?),
            None => None,
        };

        session.status = Status::Authenticated;
        session.identity = Some(identity);
        session.exchange_code.clone_from(&exchange_code);
        info!(%method, "login session authenticated");

        Ok(AuthOutcome::Authenticated { exchange_code })
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
    use crate::{access::AllowList, broker::identity::Subject};
    use std::sync::Arc;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(300);

    fn codes() -> ExchangeCodes {
        ExchangeCodes::new(Duration::from_secs(60), AllowList::default())
    }

    fn alice() -> Identity {
        Identity::telegram(42, Some("Alice".into()), None, None)
    }

    #[tokio::test]
    async fn new_session_is_pending() -> anyhow::Result<()> {
        let sessions = LoginSessions::new(TTL);
        let token = sessions.create(Some("https://app.example/".into())).await?;

        let view = sessions.poll(&token).await;
        assert_eq!(
            view,
            Some(SessionView {
                status: Status::Pending,
                identity: None,
                exchange_code: None,
                redirect: None,
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn authenticate_with_redirect_mints_one_code() -> anyhow::Result<()> {
        let sessions = LoginSessions::new(TTL);
        let codes = codes();
        let token = sessions.create(Some("https://app.example/".into())).await?;

        let first = sessions
            .authenticate(&token, alice(), Method::Telegram, &codes)
            .await?;
        let AuthOutcome::Authenticated {
            exchange_code: Some(code),
        } = first
        else {
            anyhow::bail!("expected a code, got {first:?}");
        };

        let second = sessions
            .authenticate(
                &token,
                Identity::new(Subject::Numeric(7)),
                Method::Telegram,
                &codes,
            )
            .await?;
        assert_eq!(second, AuthOutcome::AlreadyAuthenticated);
        assert_eq!(codes.len().await, 1);

        let view = sessions.poll(&token).await;
        let Some(view) = view else {
            anyhow::bail!("session vanished");
        };
        assert_eq!(view.status, Status::Authenticated);
        assert_eq!(view.identity, Some(alice()));
        assert_eq!(view.exchange_code.as_deref(), Some(code.as_str()));
        assert_eq!(view.redirect.as_deref(), Some("https://app.example/"));
        Ok(())
    }

    #[tokio::test]
    async fn authenticate_without_redirect_mints_nothing() -> anyhow::Result<()> {
        let sessions = LoginSessions::new(TTL);
        let codes = codes();
        let token = sessions.create(Some(String::new())).await?;

        let outcome = sessions
            .authenticate(&token, alice(), Method::Telegram, &codes)
            .await?;
        assert_eq!(outcome, AuthOutcome::Authenticated { exchange_code: None });
        assert!(codes.is_empty().await);

        let view = sessions.poll(&token).await;
        assert_eq!(view.and_then(|v| v.redirect), None);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_token_is_a_noop() -> anyhow::Result<()> {
        let sessions = LoginSessions::new(TTL);
        let codes = codes();
        let outcome = sessions
            .authenticate("missing", alice(), Method::Telegram, &codes)
            .await?;
        assert_eq!(outcome, AuthOutcome::Unknown);
        assert!(codes.is_empty().await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn poll_after_ttl_is_not_found() -> anyhow::Result<()> {
        let sessions = LoginSessions::new(TTL);
        let token = sessions.create(None).await?;
        advance(TTL + Duration::from_secs(1)).await;
        assert_eq!(sessions.poll(&token).await, None);
        assert!(sessions.is_empty().await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_cannot_be_authenticated() -> anyhow::Result<()> {
        let sessions = LoginSessions::new(TTL);
        let codes = codes();
        let token = sessions.create(Some("https://app.example/".into())).await?;
        advance(TTL + Duration::from_secs(1)).await;

        let outcome = sessions
            .authenticate(&token, alice(), Method::Telegram, &codes)
            .await?;
        assert_eq!(outcome, AuthOutcome::Expired);
        assert!(codes.is_empty().await);
        assert!(sessions.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_deliveries_mint_single_code() -> anyhow::Result<()> {
        let sessions = Arc::new(LoginSessions::new(TTL));
        let codes = Arc::new(codes());
        let token = sessions.create(Some("https://app.example/".into())).await?;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sessions = sessions.clone();
            let codes = codes.clone();
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                sessions
                    .authenticate(&token, alice(), Method::Telegram, &codes)
                    .await
            }));
        }

        let mut authenticated = 0;
        for handle in handles {
            if let AuthOutcome::Authenticated { .. } = handle.await?? {
                authenticated += 1;
            }
        }
        assert_eq!(authenticated, 1);
        assert_eq!(codes.len().await, 1);
        Ok(())
    }
}
