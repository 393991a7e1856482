//! TRON address decoding.
//!
//! TRON addresses are base58check strings: a 21-byte payload (the `0x41`
//! mainnet prefix plus a 20-byte account hash) followed by the first four
//! bytes of a double-SHA256 checksum. Block-explorer payloads carry the raw
//! payload as hex, so matching happens on the decoded form.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Mainnet address prefix byte.
const ADDRESS_PREFIX: u8 = 0x41;
/// Payload length: prefix byte + 20-byte account hash.
const PAYLOAD_LEN: usize = 21;
/// Checksum length appended to the payload.
const CHECKSUM_LEN: usize = 4;

/// A decoded TRON address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TronAddress {
    text: String,
    raw: [u8; PAYLOAD_LEN],
}

impl TronAddress {
    /// Decode a base58check address, verifying length, prefix, and checksum.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Address`] if the string is not a valid mainnet
    /// address.
    pub fn parse(text: &str) -> Result<Self> {
        let bytes = bs58::decode(text)
            .into_vec()
            .map_err(|e| Error::Address(format!("{text}: {e}")))?;

        if bytes.len() != PAYLOAD_LEN + CHECKSUM_LEN {
            return Err(Error::Address(format!(
                "{text}: expected {} bytes, got {}",
                PAYLOAD_LEN + CHECKSUM_LEN,
                bytes.len()
            )));
        }

        let (payload, checksum) = bytes.split_at(PAYLOAD_LEN);
        let digest = Sha256::digest(Sha256::digest(payload));
        if digest[..CHECKSUM_LEN] != *checksum {
            return Err(Error::Address(format!("{text}: checksum mismatch")));
        }

        if payload[0] != ADDRESS_PREFIX {
            return Err(Error::Address(format!(
                "{text}: unexpected prefix byte {:#04x}",
                payload[0]
            )));
        }

        let mut raw = [0u8; PAYLOAD_LEN];
        raw.copy_from_slice(payload);
        Ok(Self {
            text: text.to_string(),
            raw,
        })
    }

    /// The base58check textual form.
    #[must_use]
    pub fn as_base58(&self) -> &str {
        &self.text
    }

    /// Lowercase hex of the raw 21-byte payload, no prefix.
    #[must_use]
    pub fn hex(&self) -> String {
        hex::encode(self.raw)
    }

    /// Compare against a hex destination field from an explorer payload.
    ///
    /// Case-insensitive; an optional `0x` prefix on the observed value is
    /// tolerated.
    #[must_use]
    pub fn matches_hex(&self, observed: &str) -> bool {
        let observed = observed
            .strip_prefix("0x")
            .or_else(|| observed.strip_prefix("0X"))
            .unwrap_or(observed);
        observed.eq_ignore_ascii_case(&self.hex())
    }
}

impl FromStr for TronAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TronAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
