use clap::{Arg, ArgMatches, Command};

pub const NAME: &str = "legacy";

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_TOKENS: &str = "tokens";

#[must_use]
pub fn command() -> Command {
    Command::new(NAME)
        .about("Run the legacy username/password token service")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("SESAME_LEGACY_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("SQLite connection string")
                .env("SESAME_LEGACY_DSN")
                .default_value("sqlite://sesame.db?mode=rwc"),
        )
        .arg(
            Arg::new(ARG_TOKENS)
                .long("tokens")
                .help("Comma-separated X-Auth-Token values accepted by the API")
                .long_help(
                    "Comma-separated X-Auth-Token values accepted by the API. When empty, every protected endpoint answers 401.",
                )
                .env("SESAME_LEGACY_TOKENS")
                .hide_env_values(true)
                .default_value(""),
        )
}

#[derive(Debug)]
pub struct Options {
    pub port: u16,
    pub dsn: String,
    pub tokens: String,
}

impl Options {
    /// Parse legacy arguments from the `legacy` sub-command matches.
    ///
    /// # Errors
    /// Returns an error if the DSN is empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let dsn = matches
            .get_one::<String>(ARG_DSN)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_DSN}"))?;

        Ok(Self {
            port: matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
            dsn,
            tokens: matches.get_one::<String>(ARG_TOKENS).cloned().unwrap_or_default(),
        })
    }
}
