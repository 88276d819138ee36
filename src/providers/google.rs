//! Google OAuth 2.0 authorization-code flow.

use super::ProviderError;
use crate::broker::identity::Identity;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use url::Url;

pub const AUTHORIZATION_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const SCOPES: &str = "openid email profile";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    callback_url: String,
    authorization_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        client_id: String,
        client_secret: SecretString,
        callback_url: String,
    ) -> Self {
        Self {
            http,
            client_id,
            client_secret,
            callback_url,
            authorization_url: AUTHORIZATION_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_token_url(mut self, url: String) -> Self {
        self.token_url = url;
        self
    }

    #[must_use]
    pub fn with_userinfo_url(mut self, url: String) -> Self {
        self.userinfo_url = url;
        self
    }

    #[must_use]
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Consent page URL carrying `state`.
    ///
    /// # Errors
    /// Returns an error if the configured authorization endpoint is not a URL.
    pub fn authorization_url(&self, state: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &self.authorization_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
    }

    /// Exchange an authorization code and read the user's profile.
    ///
    /// # Errors
    /// `Unreachable` on transport failures or timeouts, `Rejected` when Google
    /// refuses the code or returns an unusable profile.
    pub async fn fetch_identity(&self, code: &str) -> Result<Identity, ProviderError> {
        let token: TokenResponse = self
            .http
            .post(&self.token_url)
            .json(&json!({
                "code": code,
                "client_id": self.client_id,
                "client_secret": self.client_secret.expose_secret(),
                "redirect_uri": self.callback_url,
                "grant_type": "authorization_code",
            }))
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = token.error {
            let detail = token.error_description.unwrap_or_default();
            return Err(ProviderError::Rejected(format!("{error} {detail}").trim().to_string()));
        }
        let access_token = token
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ProviderError::Rejected("missing access token".to_string()))?;

        let info: UserInfo = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?
            .json()
            .await?;

        if info.sub.is_empty() {
            return Err(ProviderError::Rejected("userinfo without subject".to_string()));
        }

        Ok(Identity::google(info.sub, info.email, info.name))
    }
}

impl std::fmt::Debug for GoogleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleClient")
            .field("client_id", &self.client_id)
            .field("callback_url", &self.callback_url)
            .finish_non_exhaustive()
    }
}

/// Append `code=` to a relying-party URL, respecting an existing query.
#[must_use]
pub fn append_code(redirect: &str, code: &str) -> String {
    let separator = if redirect.contains('?') { '&' } else { '?' };
    format!("{redirect}{separator}code={code}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn client() -> GoogleClient {
        GoogleClient::new(
            reqwest::Client::new(),
            "client-1".to_string(),
            SecretString::from("shh".to_string()),
            "http://localhost:8886/google/callback".to_string(),
        )
    }

    #[test]
    fn authorization_url_carries_state_and_scopes() -> anyhow::Result<()> {
        let url = client().authorization_url("st4te")?;
        assert_eq!(url.host_str(), Some("accounts.google.com"));

        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query.get("client_id").map(String::as_str), Some("client-1"));
        assert_eq!(query.get("state").map(String::as_str), Some("st4te"));
        assert_eq!(query.get("scope").map(String::as_str), Some("openid email profile"));
        assert_eq!(query.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(
            query.get("redirect_uri").map(String::as_str),
            Some("http://localhost:8886/google/callback")
        );
        Ok(())
    }

    #[test]
    fn debug_hides_secret() {
        assert!(!format!("{:?}", client()).contains("shh"));
    }

    #[test]
    fn append_code_picks_separator() {
        assert_eq!(append_code("https://a.example/cb", "c"), "https://a.example/cb?code=c");
        assert_eq!(
            append_code("https://a.example/cb?x=1", "c"),
            "https://a.example/cb?x=1&code=c"
        );
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_is_reported() {
        let client = client().with_token_url("http://127.0.0.1:1/token".to_string());
        assert!(matches!(
            client.fetch_identity("code").await,
            Err(ProviderError::Unreachable(_))
        ));
    }
}
