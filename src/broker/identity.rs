//! One identity shape for every login method.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Provider-assigned user id: Telegram ids are numeric, the rest are text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Subject {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Normalized user attributes handed to relying parties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub id: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(id: Subject) -> Self {
        Self {
            id,
            first_name: None,
            last_name: None,
            username: None,
            email: None,
            name: None,
        }
    }

    /// Telegram `from` user of a bot message.
    #[must_use]
    pub fn telegram(
        id: i64,
        first_name: Option<String>,
        last_name: Option<String>,
        username: Option<String>,
    ) -> Self {
        Self {
            first_name,
            last_name,
            username,
            ..Self::new(Subject::Numeric(id))
        }
    }

    /// A verified wallet public key is the whole identity.
    #[must_use]
    pub fn solana(public_key: &str) -> Self {
        Self::new(Subject::Text(public_key.to_string()))
    }

    /// Google userinfo: `sub` plus email and display name.
    #[must_use]
    pub fn google(sub: String, email: Option<String>, name: Option<String>) -> Self {
        Self {
            email,
            name,
            ..Self::new(Subject::Text(sub))
        }
    }
}

/// Which channel produced an identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Telegram,
    Solana,
    Google,
    Password,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Solana => "solana",
            Self::Google => "google",
            Self::Password => "password",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn telegram_identity_keeps_numeric_id() -> Result<()> {
        let identity = Identity::telegram(42, Some("Ada".into()), None, Some("ada".into()));
        assert_eq!(
            serde_json::to_value(&identity)?,
            json!({"id": 42, "first_name": "Ada", "username": "ada"})
        );
        Ok(())
    }

    #[test]
    fn solana_identity_is_only_the_key() -> Result<()> {
        assert_eq!(
            serde_json::to_value(Identity::solana("K"))?,
            json!({"id": "K"})
        );
        Ok(())
    }

    #[test]
    fn google_identity_carries_email_and_name() -> Result<()> {
        let identity = Identity::google("1234".into(), Some("a@b.c".into()), Some("A".into()));
        assert_eq!(
            serde_json::to_value(&identity)?,
            json!({"id": "1234", "email": "a@b.c", "name": "A"})
        );
        Ok(())
    }

    #[test]
    fn subject_parses_both_shapes() -> Result<()> {
        let numeric: Identity = serde_json::from_value(json!({"id": 7}))?;
        let text: Identity = serde_json::from_value(json!({"id": "seven"}))?;
        assert_eq!(numeric.id, Subject::Numeric(7));
        assert_eq!(text.id.to_string(), "seven");
        Ok(())
    }

    #[test]
    fn method_serializes_lowercase() -> Result<()> {
        assert_eq!(serde_json::to_value(Method::Telegram)?, json!("telegram"));
        assert_eq!(Method::Password.to_string(), "password");
        Ok(())
    }
}
