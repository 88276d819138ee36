//! Map validated CLI matches to the action the binary executes.

use crate::{
    access::AllowList,
    broker::BrokerConfig,
    cli::actions::{broker, legacy, Action},
    cli::commands,
};
use anyhow::{anyhow, Result};
use std::time::Duration;

/// Build the action for the chosen sub-command.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((commands::broker::NAME, sub)) => broker_action(sub),
        Some((commands::legacy::NAME, sub)) => legacy_action(sub),
        Some((other, _)) => Err(anyhow!("unknown sub-command: {other}")),
        None => Err(anyhow!("missing sub-command")),
    }
}

fn broker_action(matches: &clap::ArgMatches) -> Result<Action> {
    let opts = commands::broker::Options::parse(matches)?;

    let app_tokens = AllowList::parse(&opts.app_tokens);
    let config = BrokerConfig::new()
        .with_session_ttl_seconds(opts.session_ttl_seconds)
        .with_nonce_ttl_seconds(opts.nonce_ttl_seconds)
        .with_code_ttl_seconds(opts.code_ttl_seconds)
        .with_oauth_state_ttl_seconds(opts.oauth_state_ttl_seconds)
        .with_app_tokens(app_tokens);

    Ok(Action::Broker(broker::Args {
        port: opts.port,
        public_base_url: opts.public_base_url,
        direct_redirect: opts.direct_redirect,
        telegram: opts.telegram,
        google: opts.google,
        config,
        provider_timeout: Duration::from_secs(opts.provider_timeout_seconds),
    }))
}

fn legacy_action(matches: &clap::ArgMatches) -> Result<Action> {
    let opts = commands::legacy::Options::parse(matches)?;

    Ok(Action::Legacy(legacy::Args {
        port: opts.port,
        dsn: opts.dsn,
        tokens: AllowList::parse(&opts.tokens),
    }))
}
