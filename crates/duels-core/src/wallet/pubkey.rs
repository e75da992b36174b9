//! Wallet and program addresses.

pub use solana_pubkey::Pubkey;

use crate::{Error, Result};

/// Parses a base58 address, keeping the offending text in the error.
pub fn parse_pubkey(address: &str) -> Result<Pubkey> {
    let trimmed = address.trim();
    trimmed
        .parse()
        .map_err(|e: solana_pubkey::ParsePubkeyError| {
            Error::InvalidAddress(format!("{}: {}", trimmed, e))
        })
}
