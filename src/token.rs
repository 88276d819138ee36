//! Self-contained signed tokens for the legacy password service.
//!
//! Wire layout (standard base64 of the concatenation):
//!
//! ```text
//! signature (64 bytes) | timestamp (u64 big endian, 8 bytes) | nonce (16 bytes)
//! ```
//!
//! The signed message is `username | timestamp | nonce`. The username is not
//! part of the token, so the verifier must supply it again; presenting a
//! token with a different username fails verification. Tokens carry a
//! timestamp but are never rejected for age: they stay valid until the
//! user's key is rotated.

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const SIGNATURE_LENGTH: usize = 64;
pub const TIMESTAMP_LENGTH: usize = 8;
pub const NONCE_LENGTH: usize = 16;
pub const TOKEN_LENGTH: usize = SIGNATURE_LENGTH + TIMESTAMP_LENGTH + NONCE_LENGTH;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token size")]
    InvalidSize,
    #[error("invalid base64 encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("invalid key material")]
    InvalidKey,
    #[error("random number generator failure")]
    Rng,
}

/// Decoded token parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parts {
    pub signature: [u8; SIGNATURE_LENGTH],
    pub timestamp: u64,
    pub nonce: [u8; NONCE_LENGTH],
}

impl Parts {
    /// Parse the fixed layout; trailing bytes past the nonce are ignored.
    ///
    /// # Errors
    /// `InvalidSize` when shorter than [`TOKEN_LENGTH`].
    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() < TOKEN_LENGTH {
            return Err(Error::InvalidSize);
        }

        let (signature, rest) = raw.split_at(SIGNATURE_LENGTH);
        let (timestamp, rest) = rest.split_at(TIMESTAMP_LENGTH);
        let nonce = &rest[..NONCE_LENGTH];

        Ok(Self {
            signature: signature.try_into().map_err(|_| Error::InvalidSize)?,
            timestamp: u64::from_be_bytes(timestamp.try_into().map_err(|_| Error::InvalidSize)?),
            nonce: nonce.try_into().map_err(|_| Error::InvalidSize)?,
        })
    }

    fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(TOKEN_LENGTH);
        raw.extend_from_slice(&self.signature);
        raw.extend_from_slice(&self.timestamp.to_be_bytes());
        raw.extend_from_slice(&self.nonce);
        STANDARD.encode(raw)
    }
}

fn message(username: &str, timestamp: u64, nonce: &[u8; NONCE_LENGTH]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(username.len() + TIMESTAMP_LENGTH + NONCE_LENGTH);
    msg.extend_from_slice(username.as_bytes());
    msg.extend_from_slice(&timestamp.to_be_bytes());
    msg.extend_from_slice(nonce);
    msg
}

/// Issue a token for `username` with a fresh nonce and the current time.
///
/// # Errors
/// `Rng` when the operating system RNG fails.
pub fn issue(key: &SigningKey, username: &str) -> Result<String, Error> {
    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.try_fill_bytes(&mut nonce).map_err(|_| Error::Rng)?;
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    Ok(issue_at(key, username, timestamp, nonce))
}

/// Deterministic issuance with caller-chosen timestamp and nonce.
#[must_use]
pub fn issue_at(
    key: &SigningKey,
    username: &str,
    timestamp: u64,
    nonce: [u8; NONCE_LENGTH],
) -> String {
    let signature = key.sign(&message(username, timestamp, &nonce));
    Parts {
        signature: signature.to_bytes(),
        timestamp,
        nonce,
    }
    .encode()
}

/// Check `token` against `username`.
///
/// A signature mismatch is `Ok(false)`; only a malformed token is an error.
///
/// # Errors
/// `Encoding` for invalid base64, `InvalidSize` for short tokens.
pub fn verify(key: &VerifyingKey, token: &str, username: &str) -> Result<bool, Error> {
    let raw = STANDARD.decode(token.trim())?;
    let parts = Parts::from_bytes(&raw)?;
    let signature = Signature::from_bytes(&parts.signature);
    Ok(key
        .verify(&message(username, parts.timestamp, &parts.nonce), &signature)
        .is_ok())
}

/// Verify `old_token` against `public` and, when valid, issue a replacement
/// signed by `key`.
///
/// Returns `Ok(None)` when the old token does not verify.
///
/// # Errors
/// Propagates decode errors from [`verify`] and RNG errors from [`issue`].
pub fn refresh(
    key: &SigningKey,
    public: &VerifyingKey,
    old_token: &str,
    username: &str,
) -> Result<Option<String>, Error> {
    if !verify(public, old_token, username)? {
        return Ok(None);
    }
    issue(key, username).map(Some)
}

/// Generate a fresh signing key.
#[must_use]
pub fn generate_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Restore a signing key from its stored 64-byte keypair (seed then public key).
///
/// # Errors
/// `InvalidKey` when the bytes are not a consistent keypair.
pub fn signing_key_from_keypair(raw: &[u8]) -> Result<SigningKey, Error> {
    let bytes: [u8; 64] = raw.try_into().map_err(|_| Error::InvalidKey)?;
    SigningKey::from_keypair_bytes(&bytes).map_err(|_| Error::InvalidKey)
}

#[must_use]
pub fn encode_verifying_key(key: &VerifyingKey) -> String {
    STANDARD.encode(key.as_bytes())
}

/// # Errors
/// `Encoding` or `InvalidKey` when the stored public key is corrupt.
pub fn decode_verifying_key(encoded: &str) -> Result<VerifyingKey, Error> {
    let raw = STANDARD.decode(encoded.trim())?;
    let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| Error::InvalidKey)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| Error::InvalidKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn issued_token_verifies_for_same_username() -> Result<()> {
        let key = generate_key();
        let token = issue(&key, "alice")?;
        assert_eq!(STANDARD.decode(&token)?.len(), TOKEN_LENGTH);
        assert!(verify(&key.verifying_key(), &token, "alice")?);
        Ok(())
    }

    #[test]
    fn token_is_bound_to_username() -> Result<()> {
        let key = generate_key();
        let token = issue(&key, "alice")?;
        assert!(!verify(&key.verifying_key(), &token, "bob")?);
        assert!(!verify(&key.verifying_key(), &token, "alice ")?);
        Ok(())
    }

    #[test]
    fn token_from_other_key_does_not_verify() -> Result<()> {
        let token = issue(&generate_key(), "alice")?;
        assert!(!verify(&generate_key().verifying_key(), &token, "alice")?);
        Ok(())
    }

    #[test]
    fn short_token_is_invalid_size() {
        let key = generate_key();
        let short = STANDARD.encode([0u8; TOKEN_LENGTH - 1]);
        assert!(matches!(
            verify(&key.verifying_key(), &short, "alice"),
            Err(Error::InvalidSize)
        ));
    }

    #[test]
    fn garbage_is_encoding_error() {
        let key = generate_key();
        assert!(matches!(
            verify(&key.verifying_key(), "not base64 !!", "alice"),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn old_timestamps_still_verify() -> Result<()> {
        let key = generate_key();
        let token = issue_at(&key, "alice", 1, [7u8; NONCE_LENGTH]);
        assert!(verify(&key.verifying_key(), &token, "alice")?);

        let parts = Parts::from_bytes(&STANDARD.decode(&token)?)?;
        assert_eq!(parts.timestamp, 1);
        assert_eq!(parts.nonce, [7u8; NONCE_LENGTH]);
        Ok(())
    }

    #[test]
    fn tampered_timestamp_fails() -> Result<()> {
        let key = generate_key();
        let token = issue_at(&key, "alice", 100, [1u8; NONCE_LENGTH]);
        let mut raw = STANDARD.decode(&token)?;
        raw[SIGNATURE_LENGTH + TIMESTAMP_LENGTH - 1] ^= 1;
        assert!(!verify(&key.verifying_key(), &STANDARD.encode(raw), "alice")?);
        Ok(())
    }

    #[test]
    fn refresh_reissues_only_for_valid_tokens() -> Result<()> {
        let key = generate_key();
        let token = issue(&key, "alice")?;

        let renewed = refresh(&key, &key.verifying_key(), &token, "alice")?;
        let Some(renewed) = renewed else {
            anyhow::bail!("refresh rejected a valid token");
        };
        assert_ne!(renewed, token);
        assert!(verify(&key.verifying_key(), &renewed, "alice")?);

        assert!(refresh(&key, &key.verifying_key(), &token, "bob")?.is_none());

        let stranger = generate_key();
        assert!(refresh(&key, &stranger.verifying_key(), &token, "alice")?.is_none());
        Ok(())
    }

    #[test]
    fn keys_survive_storage_encoding() -> Result<()> {
        let key = generate_key();
        let restored = signing_key_from_keypair(&key.to_keypair_bytes())?;
        let public = decode_verifying_key(&encode_verifying_key(&key.verifying_key()))?;

        let token = issue(&restored, "alice")?;
        assert!(verify(&public, &token, "alice")?);
        assert!(matches!(
            decode_verifying_key(&STANDARD.encode([0u8; 5])),
            Err(Error::InvalidKey)
        ));
        assert!(matches!(
            signing_key_from_keypair(&[0u8; 32]),
            Err(Error::InvalidKey)
        ));
        Ok(())
    }
}
