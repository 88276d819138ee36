//! Random identifiers used by the broker stores.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use std::fmt::Write;

/// Bytes of entropy behind every session token, exchange code and OAuth state.
pub const TOKEN_BYTES: usize = 32;

/// Create an unguessable URL-safe token.
pub(crate) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate random token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Create `len` random bytes rendered as lowercase hex.
pub(crate) fn generate_hex(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate random nonce")?;
    Ok(bytes.iter().fold(String::with_capacity(len * 2), |mut acc, byte| {
        let _ = write!(acc, "{byte:02x}");
        acc
    }))
}

/// Normalize an optional relying-party URL: blank means "no redirect".
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
