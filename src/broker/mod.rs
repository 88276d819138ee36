//! The login broker: four independent ephemeral stores and the flows that
//! move an authentication attempt through them.
//!
//! ```text
//! create session ──► pending ──(bot /start)──► authenticated ──► exchange code
//! solana nonce ──► signature verified ───────────────────────────► exchange code
//! google state ──► callback + userinfo ──────────────────────────► exchange code
//! ```
//!
//! Each store has its own lock. The only path touching two stores is
//! session authentication, which always locks sessions before codes.

pub mod challenge;
pub mod exchange;
pub mod identity;
pub mod oauth;
pub mod session;
pub mod utils;

use crate::access::AllowList;
use std::time::Duration;

use self::{
    challenge::Challenges, exchange::ExchangeCodes, oauth::OAuthStates, session::LoginSessions,
};

const DEFAULT_SESSION_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_NONCE_TTL_SECONDS: u64 = 60;
const DEFAULT_CODE_TTL_SECONDS: u64 = 60;
const DEFAULT_OAUTH_STATE_TTL_SECONDS: u64 = 5 * 60;

#[derive(Clone, Debug)]
pub struct BrokerConfig {
    session_ttl_seconds: u64,
    nonce_ttl_seconds: u64,
    code_ttl_seconds: u64,
    oauth_state_ttl_seconds: u64,
    app_tokens: AllowList,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            nonce_ttl_seconds: DEFAULT_NONCE_TTL_SECONDS,
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            oauth_state_ttl_seconds: DEFAULT_OAUTH_STATE_TTL_SECONDS,
            app_tokens: AllowList::default(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_nonce_ttl_seconds(mut self, seconds: u64) -> Self {
        self.nonce_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: u64) -> Self {
        self.code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_oauth_state_ttl_seconds(mut self, seconds: u64) -> Self {
        self.oauth_state_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_app_tokens(mut self, app_tokens: AllowList) -> Self {
        self.app_tokens = app_tokens;
        self
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn nonce_ttl(&self) -> Duration {
        Duration::from_secs(self.nonce_ttl_seconds)
    }

    #[must_use]
    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl_seconds)
    }

    #[must_use]
    pub fn oauth_state_ttl(&self) -> Duration {
        Duration::from_secs(self.oauth_state_ttl_seconds)
    }

    #[must_use]
    pub fn app_tokens(&self) -> &AllowList {
        &self.app_tokens
    }
}

/// Shared broker state, built once by the entry point and injected into the
/// router as `Extension<Arc<Broker>>`.
pub struct Broker {
    sessions: LoginSessions,
    challenges: Challenges,
    codes: ExchangeCodes,
    oauth_states: OAuthStates,
}

/// Current record counts, reported by `/health`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreSizes {
    pub sessions: usize,
    pub nonces: usize,
    pub codes: usize,
    pub oauth_states: usize,
}

impl Broker {
    #[must_use]
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            sessions: LoginSessions::new(config.session_ttl()),
            challenges: Challenges::new(config.nonce_ttl()),
            codes: ExchangeCodes::new(config.code_ttl(), config.app_tokens().clone()),
            oauth_states: OAuthStates::new(config.oauth_state_ttl()),
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &LoginSessions {
        &self.sessions
    }

    #[must_use]
    pub fn challenges(&self) -> &Challenges {
        &self.challenges
    }

    #[must_use]
    pub fn codes(&self) -> &ExchangeCodes {
        &self.codes
    }

    #[must_use]
    pub fn oauth_states(&self) -> &OAuthStates {
        &self.oauth_states
    }

    /// Authenticate a QR session from a Telegram bot event.
    ///
    /// # Errors
    /// Fails only when minting the exchange code fails.
    pub async fn authenticate_session(
        &self,
        token: &str,
        identity: identity::Identity,
    ) -> anyhow::Result<session::AuthOutcome> {
        self.sessions
            .authenticate(token, identity, identity::Method::Telegram, &self.codes)
            .await
    }

    pub async fn sizes(&self) -> StoreSizes {
        StoreSizes {
            sessions: self.sessions.len().await,
            nonces: self.challenges.len().await,
            codes: self.codes.len().await,
            oauth_states: self.oauth_states.len().await,
        }
    }
}
