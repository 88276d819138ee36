use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const NAME: &str = "broker";

pub const ARG_PORT: &str = "port";
pub const ARG_PUBLIC_BASE_URL: &str = "public-base-url";
pub const ARG_DIRECT_REDIRECT: &str = "direct-redirect";
pub const ARG_APP_TOKENS: &str = "app-tokens";
pub const ARG_TELEGRAM_BOT_TOKEN: &str = "telegram-bot-token";
pub const ARG_TELEGRAM_BOT_USERNAME: &str = "telegram-bot-username";
pub const ARG_TELEGRAM_WEBHOOK_SECRET: &str = "telegram-webhook-secret";
pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_GOOGLE_CALLBACK_URL: &str = "google-callback-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_NONCE_TTL_SECONDS: &str = "nonce-ttl-seconds";
pub const ARG_OAUTH_STATE_TTL_SECONDS: &str = "oauth-state-ttl-seconds";
pub const ARG_PROVIDER_TIMEOUT_SECONDS: &str = "provider-timeout-seconds";

#[must_use]
pub fn command() -> Command {
    let command = Command::new(NAME)
        .about("Run the federated login broker")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8886")
                .env("SESAME_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_PUBLIC_BASE_URL)
                .long(ARG_PUBLIC_BASE_URL)
                .help("Externally reachable base URL of the broker")
                .env("SESAME_PUBLIC_BASE_URL")
                .default_value("http://localhost:8886"),
        )
        .arg(
            Arg::new(ARG_DIRECT_REDIRECT)
                .long(ARG_DIRECT_REDIRECT)
                .help("Landing page for browsers that arrive without a redirect")
                .env("SESAME_DIRECT_REDIRECT"),
        )
        .arg(
            Arg::new(ARG_APP_TOKENS)
                .long(ARG_APP_TOKENS)
                .help("Comma-separated caller tokens allowed to redeem exchange codes")
                .long_help(
                    "Comma-separated caller tokens allowed to redeem exchange codes. When empty, /exchange accepts any caller.",
                )
                .env("SESAME_APP_TOKENS")
                .default_value(""),
        );

    let command = with_telegram_args(command);
    let command = with_google_args(command);
    with_ttl_args(command)
}

fn with_telegram_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TELEGRAM_BOT_TOKEN)
                .long(ARG_TELEGRAM_BOT_TOKEN)
                .help("Telegram bot API token; acknowledgements are only logged when unset")
                .env("SESAME_TELEGRAM_BOT_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TELEGRAM_BOT_USERNAME)
                .long(ARG_TELEGRAM_BOT_USERNAME)
                .help("Telegram bot username used in deep links")
                .env("SESAME_TELEGRAM_BOT_USERNAME")
                .default_value(""),
        )
        .arg(
            Arg::new(ARG_TELEGRAM_WEBHOOK_SECRET)
                .long(ARG_TELEGRAM_WEBHOOK_SECRET)
                .help("Expected X-Telegram-Bot-Api-Secret-Token header value")
                .env("SESAME_TELEGRAM_WEBHOOK_SECRET")
                .hide_env_values(true),
        )
}

fn with_google_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth client id; Google login is disabled when unset")
                .env("SESAME_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("Google OAuth client secret")
                .env("SESAME_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CALLBACK_URL)
                .long(ARG_GOOGLE_CALLBACK_URL)
                .help("Google OAuth callback URL (default: <public-base-url>/google/callback)")
                .env("SESAME_GOOGLE_CALLBACK_URL"),
        )
}

fn with_ttl_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Login session TTL in seconds")
                .env("SESAME_SESSION_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("Exchange code TTL in seconds")
                .env("SESAME_CODE_TTL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_NONCE_TTL_SECONDS)
                .long(ARG_NONCE_TTL_SECONDS)
                .help("Wallet challenge nonce TTL in seconds")
                .env("SESAME_NONCE_TTL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_OAUTH_STATE_TTL_SECONDS)
                .long(ARG_OAUTH_STATE_TTL_SECONDS)
                .help("OAuth state TTL in seconds")
                .env("SESAME_OAUTH_STATE_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_PROVIDER_TIMEOUT_SECONDS)
                .long(ARG_PROVIDER_TIMEOUT_SECONDS)
                .help("Timeout for every outbound provider call in seconds")
                .env("SESAME_PROVIDER_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug)]
pub struct TelegramOptions {
    pub bot_token: Option<SecretString>,
    pub bot_username: String,
    pub webhook_secret: Option<SecretString>,
}

#[derive(Debug)]
pub struct GoogleOptions {
    pub client_id: String,
    pub client_secret: SecretString,
    pub callback_url: String,
}

#[derive(Debug)]
pub struct Options {
    pub port: u16,
    pub public_base_url: String,
    pub direct_redirect: Option<String>,
    pub app_tokens: String,
    pub telegram: TelegramOptions,
    pub google: Option<GoogleOptions>,
    pub session_ttl_seconds: u64,
    pub code_ttl_seconds: u64,
    pub nonce_ttl_seconds: u64,
    pub oauth_state_ttl_seconds: u64,
    pub provider_timeout_seconds: u64,
}

impl Options {
    /// Parse broker arguments from the `broker` sub-command matches.
    ///
    /// # Errors
    /// Returns an error if a Google client id is given without its secret.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // env vars set to "" reach us as empty strings
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let get_u64 = |id: &str| -> anyhow::Result<u64> {
            matches
                .get_one::<u64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let public_base_url = get_non_empty(ARG_PUBLIC_BASE_URL)
            .unwrap_or_else(|| "http://localhost:8886".to_string())
            .trim_end_matches('/')
            .to_string();

        let google = match get_non_empty(ARG_GOOGLE_CLIENT_ID) {
            None => None,
            Some(client_id) => {
                let Some(client_secret) = get_non_empty(ARG_GOOGLE_CLIENT_SECRET) else {
                    anyhow::bail!(
                        "missing required argument: --{ARG_GOOGLE_CLIENT_SECRET} (required with --{ARG_GOOGLE_CLIENT_ID})"
                    );
                };
                let callback_url = get_non_empty(ARG_GOOGLE_CALLBACK_URL)
                    .unwrap_or_else(|| format!("{public_base_url}/google/callback"));
                Some(GoogleOptions {
                    client_id,
                    client_secret: SecretString::from(client_secret),
                    callback_url,
                })
            }
        };

        Ok(Self {
            port: matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8886),
            direct_redirect: get_non_empty(ARG_DIRECT_REDIRECT),
            app_tokens: get_non_empty(ARG_APP_TOKENS).unwrap_or_default(),
            telegram: TelegramOptions {
                bot_token: get_non_empty(ARG_TELEGRAM_BOT_TOKEN).map(SecretString::from),
                bot_username: get_non_empty(ARG_TELEGRAM_BOT_USERNAME).unwrap_or_default(),
                webhook_secret: get_non_empty(ARG_TELEGRAM_WEBHOOK_SECRET).map(SecretString::from),
            },
            google,
            public_base_url,
            session_ttl_seconds: get_u64(ARG_SESSION_TTL_SECONDS)?,
            code_ttl_seconds: get_u64(ARG_CODE_TTL_SECONDS)?,
            nonce_ttl_seconds: get_u64(ARG_NONCE_TTL_SECONDS)?,
            oauth_state_ttl_seconds: get_u64(ARG_OAUTH_STATE_TTL_SECONDS)?,
            provider_timeout_seconds: get_u64(ARG_PROVIDER_TIMEOUT_SECONDS)?,
        })
    }
}
