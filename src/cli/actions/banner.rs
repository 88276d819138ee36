use std::fmt::Write as _;
use tracing::info;

/// Log the startup configuration as one aligned block under the banner.
pub(crate) fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ = write!(message, "\n  {key}:{padding} {value}");
    }
    info!("{message}");
}

pub(crate) fn set_or_unset(value: bool) -> String {
    let word = if value { "set" } else { "unset" };
    word.to_string()
}

fn banner() -> String {
    SESAME_BANNER.replace(
        "{VERSION}",
        &format!(
            " - {} - {}",
            env!("CARGO_PKG_VERSION"),
            short_commit(crate::GIT_COMMIT_HASH)
        ),
    )
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}

const SESAME_BANNER: &str = r"
    .-----.
   / .---. \
   | |   | |
  _|_|___|_|_
 |     o     |
 |    /|\    |  S E S A M E {VERSION}
 |___________|";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit(" 0123456789abcdef "), "0123456");
        assert_eq!(short_commit("abc"), "abc");
    }

    #[test]
    fn banner_carries_version() {
        assert!(banner().contains(env!("CARGO_PKG_VERSION")));
        assert!(!banner().contains("{VERSION}"));
    }

    #[test]
    fn set_or_unset_words() {
        assert_eq!(set_or_unset(true), "set");
        assert_eq!(set_or_unset(false), "unset");
    }
}
