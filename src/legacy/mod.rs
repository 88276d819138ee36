//! Legacy username/password service.
//!
//! Each user owns an ed25519 key pair. Login mints a self-contained token
//! (see [`crate::token`]) that relying parties verify with `/verify` without
//! any server-side session. Rotating the key pair invalidates every token
//! issued under the old key.

pub mod password;
pub mod users;

use crate::token;
use anyhow::{Context, Result};
use tracing::info;

use self::users::{Created, NewUser, User, UserStore};

#[derive(Debug, PartialEq, Eq)]
pub enum Registration {
    Created { token: String },
    AlreadyExists,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Refresh {
    Renewed { token: String },
    UnknownUser,
    InvalidToken,
}

#[derive(Clone)]
pub struct LegacyService {
    users: UserStore,
}

impl LegacyService {
    #[must_use]
    pub fn new(users: UserStore) -> Self {
        Self { users }
    }

    #[must_use]
    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// # Errors
    /// Returns an error on database, hashing or RNG failure.
    pub async fn register(&self, username: &str, password: &str) -> Result<Registration> {
        if self.users.find_by_username(username).await?.is_some() {
            return Ok(Registration::AlreadyExists);
        }

        let password_hash = password::hash(password.to_string()).await?;
        let key = token::generate_key();
        let issued = token::issue(&key, username).context("Failed to issue token")?;

        let created = self
            .users
            .create(NewUser {
                username,
                password_hash: &password_hash,
                private_key: &key.to_keypair_bytes(),
                public_key: &token::encode_verifying_key(&key.verifying_key()),
            })
            .await?;

        Ok(match created {
            Created::User(user) => {
                info!(user_id = user.id, "registered legacy user");
                Registration::Created { token: issued }
            }
            Created::AlreadyExists => Registration::AlreadyExists,
        })
    }

    /// `None` for an unknown user or a wrong password.
    ///
    /// # Errors
    /// Returns an error on database, hashing or key decoding failure.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<String>> {
        let Some(user) = self.authenticate(username, password).await? else {
            return Ok(None);
        };
        let key = token::signing_key_from_keypair(&user.private_key)
            .context("Stored private key is corrupt")?;
        Ok(Some(token::issue(&key, username)?))
    }

    /// The user record when `presented` is a valid token for `username`.
    ///
    /// Malformed tokens count as invalid.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn verify(&self, username: &str, presented: &str) -> Result<Option<User>> {
        let Some(user) = self.users.find_by_username(username).await? else {
            return Ok(None);
        };
        let valid = token::decode_verifying_key(&user.public_key)
            .and_then(|key| token::verify(&key, presented, username))
            .unwrap_or(false);
        Ok(valid.then_some(user))
    }

    /// # Errors
    /// Returns an error on database, key decoding or RNG failure.
    pub async fn refresh(&self, username: &str, old_token: &str) -> Result<Refresh> {
        let Some(user) = self.users.find_by_username(username).await? else {
            return Ok(Refresh::UnknownUser);
        };
        let key = token::signing_key_from_keypair(&user.private_key)
            .context("Stored private key is corrupt")?;
        let public = token::decode_verifying_key(&user.public_key)
            .context("Stored public key is corrupt")?;

        match token::refresh(&key, &public, old_token, username) {
            Ok(Some(token)) => Ok(Refresh::Renewed { token }),
            Ok(None) | Err(token::Error::Encoding(_) | token::Error::InvalidSize) => {
                Ok(Refresh::InvalidToken)
            }
            Err(err) => Err(err).context("Failed to refresh token"),
        }
    }

    /// Replace the user's key pair and return a token under the new key.
    ///
    /// `None` for an unknown user or a wrong password.
    ///
    /// # Errors
    /// Returns an error on database, hashing or RNG failure.
    pub async fn rotate(&self, username: &str, password: &str) -> Result<Option<String>> {
        if self.authenticate(username, password).await?.is_none() {
            return Ok(None);
        }

        let key = token::generate_key();
        let rotated = self
            .users
            .rotate_keys(
                username,
                &key.to_keypair_bytes(),
                &token::encode_verifying_key(&key.verifying_key()),
            )
            .await?;
        if !rotated {
            return Ok(None);
        }

        info!("rotated legacy user key pair");
        Ok(Some(token::issue(&key, username)?))
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.users.find_by_username(username).await? else {
            return Ok(None);
        };
        let valid = password::verify(password.to_string(), user.password_hash.clone()).await?;
        Ok(valid.then_some(user))
    }
}
