//! Wallet signature challenges keyed by Solana public key.

use super::{identity::Identity, utils::generate_hex};
use crate::ephemeral::{Expiring, Store};
use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

pub const CHALLENGE_PREFIX: &str = "Sign in to Sesame\nNonce: ";
const NONCE_BYTES: usize = 16;

#[derive(Clone, Debug)]
pub struct Challenge {
    text: String,
    created_at: Instant,
}

impl Expiring for Challenge {
    fn created_at(&self) -> Instant {
        self.created_at
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejected {
    #[error("invalid or expired nonce")]
    NoOrExpiredNonce,
    #[error("invalid {0}")]
    MalformedInput(&'static str),
    #[error("invalid signature")]
    BadSignature,
}

pub struct Challenges {
    store: Store<Challenge>,
}

impl Challenges {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Store::new("nonces", ttl),
        }
    }

    /// Issue the text the wallet must sign, replacing any earlier challenge
    /// for the same key.
    ///
    /// # Errors
    /// Fails only when the random source does.
    pub async fn issue(&self, public_key: &str) -> Result<String> {
        let text = format!("{CHALLENGE_PREFIX}{}", generate_hex(NONCE_BYTES)?);
        self.store.sweep().await;
        self.store
            .put(
                public_key.to_string(),
                Challenge {
                    text: text.clone(),
                    created_at: Instant::now(),
                },
            )
            .await;
        debug!("issued signature challenge");
        Ok(text)
    }

    /// Check a base64 ed25519 `signature` over `presented` by the base58
    /// `public_key`, consuming the challenge on success.
    ///
    /// # Errors
    /// See [`Rejected`]; only a successful verification consumes the challenge.
    pub async fn verify(
        &self,
        public_key: &str,
        signature: &str,
        presented: &str,
    ) -> Result<Identity, Rejected> {
        self.store.sweep().await;
        let outstanding = self.store.get(public_key).await;
        if outstanding.map_or(true, |challenge| challenge.text != presented) {
            info!("signature rejected: no matching nonce");
            return Err(Rejected::NoOrExpiredNonce);
        }

        let key = decode_public_key(public_key)?;
        let signature = decode_signature(signature)?;

        if key.verify(presented.as_bytes(), &signature).is_err() {
            info!("signature rejected: verification failed");
            return Err(Rejected::BadSignature);
        }

        // a concurrent request may have consumed or replaced it meanwhile
        self.store
            .take_if(public_key, |challenge| challenge.text == presented)
            .await
            .ok_or(Rejected::NoOrExpiredNonce)?;

        Ok(Identity::solana(public_key))
    }

    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.store.is_empty().await
    }
}

fn decode_public_key(public_key: &str) -> Result<VerifyingKey, Rejected> {
    let raw = bs58::decode(public_key)
        .into_vec()
        .map_err(|_| Rejected::MalformedInput("public key"))?;
    let bytes: [u8; 32] = raw
        .as_slice()
        .try_into()
        .map_err(|_| Rejected::MalformedInput("public key"))?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| Rejected::MalformedInput("public key"))
}

fn decode_signature(signature: &str) -> Result<Signature, Rejected> {
    let raw = STANDARD
        .decode(signature)
        .map_err(|_| Rejected::MalformedInput("signature encoding"))?;
    let bytes: [u8; 64] = raw
        .as_slice()
        .try_into()
        .map_err(|_| Rejected::MalformedInput("signature encoding"))?;
    Ok(Signature::from_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::identity::Subject;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(60);

    struct Wallet {
        key: SigningKey,
        address: String,
    }

    impl Wallet {
        fn new() -> Self {
            let key = SigningKey::generate(&mut OsRng);
            let address = bs58::encode(key.verifying_key().as_bytes()).into_string();
            Self { key, address }
        }

        fn sign(&self, text: &str) -> String {
            STANDARD.encode(self.key.sign(text.as_bytes()).to_bytes())
        }
    }

    #[tokio::test]
    async fn challenge_text_embeds_nonce() -> anyhow::Result<()> {
        let challenges = Challenges::new(TTL);
        let text = challenges.issue("K").await?;
        let nonce = text.strip_prefix(CHALLENGE_PREFIX).unwrap_or_default();
        assert_eq!(nonce.len(), NONCE_BYTES * 2);
        assert_ne!(text, challenges.issue("K").await?);
        assert_eq!(challenges.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn valid_signature_yields_key_identity() -> anyhow::Result<()> {
        let challenges = Challenges::new(TTL);
        let wallet = Wallet::new();
        let text = challenges.issue(&wallet.address).await?;

        let identity = challenges
            .verify(&wallet.address, &wallet.sign(&text), &text)
            .await?;
        assert_eq!(identity.id, Subject::Text(wallet.address.clone()));
        assert!(challenges.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn nonce_is_single_use() -> anyhow::Result<()> {
        let challenges = Challenges::new(TTL);
        let wallet = Wallet::new();
        let text = challenges.issue(&wallet.address).await?;

        challenges
            .verify(&wallet.address, &wallet.sign(&text), &text)
            .await?;
        assert_eq!(
            challenges
                .verify(&wallet.address, &wallet.sign(&text), &text)
                .await,
            Err(Rejected::NoOrExpiredNonce)
        );
        Ok(())
    }

    #[tokio::test]
    async fn wrong_nonce_then_fresh_nonce() -> anyhow::Result<()> {
        let challenges = Challenges::new(TTL);
        let wallet = Wallet::new();
        let stale = challenges.issue(&wallet.address).await?;
        let fresh = challenges.issue(&wallet.address).await?;

        assert_eq!(
            challenges
                .verify(&wallet.address, &wallet.sign(&stale), &stale)
                .await,
            Err(Rejected::NoOrExpiredNonce)
        );

        let again = challenges.issue(&wallet.address).await?;
        assert_ne!(again, fresh);
        assert!(challenges
            .verify(&wallet.address, &wallet.sign(&again), &again)
            .await
            .is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn bad_signature_keeps_challenge() -> anyhow::Result<()> {
        let challenges = Challenges::new(TTL);
        let wallet = Wallet::new();
        let impostor = Wallet::new();
        let text = challenges.issue(&wallet.address).await?;

        assert_eq!(
            challenges
                .verify(&wallet.address, &impostor.sign(&text), &text)
                .await,
            Err(Rejected::BadSignature)
        );
        assert!(challenges
            .verify(&wallet.address, &wallet.sign(&text), &text)
            .await
            .is_ok());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn verify_sweeps_other_expired_challenges() -> anyhow::Result<()> {
        let challenges = Challenges::new(TTL);
        let idle = Wallet::new();
        challenges.issue(&idle.address).await?;
        advance(TTL + Duration::from_secs(1)).await;

        let wallet = Wallet::new();
        assert_eq!(
            challenges
                .verify(&wallet.address, &wallet.sign("x"), "x")
                .await,
            Err(Rejected::NoOrExpiredNonce)
        );
        assert!(challenges.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_inputs_name_the_field() -> anyhow::Result<()> {
        let challenges = Challenges::new(TTL);
        let wallet = Wallet::new();

        let text = challenges.issue("short").await?;
        assert_eq!(
            challenges.verify("short", &wallet.sign(&text), &text).await,
            Err(Rejected::MalformedInput("public key"))
        );

        let text = challenges.issue(&wallet.address).await?;
        assert_eq!(
            challenges.verify(&wallet.address, "%%%", &text).await,
            Err(Rejected::MalformedInput("signature encoding"))
        );
        assert_eq!(
            challenges
                .verify(&wallet.address, &STANDARD.encode([1u8; 10]), &text)
                .await,
            Err(Rejected::MalformedInput("signature encoding"))
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_challenge_is_rejected() -> anyhow::Result<()> {
        let challenges = Challenges::new(TTL);
        let wallet = Wallet::new();
        let text = challenges.issue(&wallet.address).await?;
        advance(TTL + Duration::from_secs(1)).await;

        assert_eq!(
            challenges
                .verify(&wallet.address, &wallet.sign(&text), &text)
                .await,
            Err(Rejected::NoOrExpiredNonce)
        );
        Ok(())
    }
}
