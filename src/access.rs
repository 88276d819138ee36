//! Caller-token allow-lists.
//!
//! Used twice: relying parties present an app token to `/exchange`, and the
//! legacy service guards its endpoints with `X-Auth-Token`. Comparisons are
//! constant time so a probe cannot learn a token prefix from response timing.

use subtle::ConstantTimeEq;

#[derive(Clone, Default)]
pub struct AllowList {
    tokens: Vec<String>,
}

impl AllowList {
    #[must_use]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|token| token.as_ref().trim().to_string())
                .filter(|token| !token.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list, ignoring blanks.
    #[must_use]
    pub fn parse(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Strict membership: an empty list admits nobody.
    #[must_use]
    pub fn contains(&self, candidate: &str) -> bool {
        self.tokens.iter().fold(false, |found, token| {
            let equal: bool = token.as_bytes().ct_eq(candidate.as_bytes()).into();
            found | equal
        })
    }

    /// Open-by-default check: an empty list admits everyone.
    #[must_use]
    pub fn permits(&self, candidate: &str) -> bool {
        self.is_empty() || self.contains(candidate)
    }
}

impl std::fmt::Debug for AllowList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowList")
            .field("tokens", &format_args!("[{} redacted]", self.tokens.len()))
            .finish()
    }
}

/// Constant-time comparison for single shared secrets (webhook secret).
#[must_use]
pub fn secret_matches(expected: &str, candidate: &str) -> bool {
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}
