use crate::{
    access::AllowList,
    api,
    cli::actions::banner::log_entries,
    legacy::{users::UserStore, LegacyService},
};
use anyhow::{Context, Result};
use tracing::warn;

const MAX_CONNECTIONS: u32 = 5;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub tokens: AllowList,
}

/// Execute the legacy action.
/// # Errors
/// Returns an error if the database cannot be opened or migrated, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    if args.tokens.is_empty() {
        warn!("no X-Auth-Token configured, every protected endpoint will answer 401");
    }

    let users = UserStore::connect(&args.dsn, MAX_CONNECTIONS)
        .await
        .context("Failed to open the user database")?;

    let app = api::legacy_app(LegacyService::new(users), args.tokens);

    api::serve(args.port, app).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", args.dsn.clone()),
        ("auth_tokens", args.tokens.len().to_string()),
    ];
    log_entries("Legacy configuration", &entries);
}
