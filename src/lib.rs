//! # Sesame
//!
//! `sesame` is a federated login broker. A relying application sends the user
//! to the broker, the user proves who they are through Telegram, a Solana
//! wallet signature or Google, and the application redeems a short-lived
//! single-use exchange code for the normalized identity.
//!
//! All broker state (login sessions, wallet nonces, exchange codes and OAuth
//! states) is ephemeral: it lives in TTL-bounded in-memory stores and is lost on
//! restart. The only persistent data belongs to the `legacy` service, a small
//! username/password API that issues stateless Ed25519 signed tokens.

pub mod access;
pub mod api;
pub mod broker;
pub mod cli;
pub mod ephemeral;
pub mod legacy;
pub mod providers;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
