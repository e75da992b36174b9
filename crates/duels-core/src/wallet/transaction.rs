//! Server-built transactions awaiting the wallet's signature.
//!
//! Payloads arrive as base64 of the bincode wire form, legacy or v0. The
//! signer only fills its own slot; the message is never altered.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;

use super::Pubkey;
use crate::{Error, Result};

pub const SIGNATURE_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    inner: VersionedTransaction,
}

impl Transaction {
    pub fn from_base64(payload: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::InvalidTransaction(format!("not base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner: VersionedTransaction = bincode::deserialize(bytes)
            .map_err(|e| Error::InvalidTransaction(format!("undecodable payload: {}", e)))?;

        let required = usize::from(inner.message.header().num_required_signatures);
        if inner.signatures.len() != required {
            return Err(Error::InvalidTransaction(format!(
                "{} signature slots for {} required signers",
                inner.signatures.len(),
                required
            )));
        }
        if inner.message.static_account_keys().len() < required {
            return Err(Error::InvalidTransaction(format!(
                "{} account keys for {} required signers",
                inner.message.static_account_keys().len(),
                required
            )));
        }

        Ok(Self { inner })
    }

    /// The bytes every signer signs.
    pub fn message_data(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.inner.message)
            .map_err(|e| Error::InvalidTransaction(format!("message encoding failed: {}", e)))
    }

    pub fn required_signers(&self) -> &[Pubkey] {
        let required = self.inner.signatures.len();
        &self.inner.message.static_account_keys()[..required]
    }

    /// Puts `signature` into the slot that belongs to `signer`.
    pub fn add_signature(&mut self, signer: &Pubkey, signature: Signature) -> Result<()> {
        let index = self
            .required_signers()
            .iter()
            .position(|key| key == signer)
            .ok_or_else(|| {
                Error::InvalidTransaction(format!("{} is not a required signer", signer))
            })?;
        self.inner.signatures[index] = signature;
        Ok(())
    }

    pub fn is_fully_signed(&self) -> bool {
        self.inner
            .signatures
            .iter()
            .all(|signature| *signature != Signature::default())
    }

    /// Base58 of the fee payer's signature, which is the transaction id.
    pub fn id(&self) -> Option<String> {
        self.inner
            .signatures
            .first()
            .filter(|signature| **signature != Signature::default())
            .map(|signature| bs58::encode(signature).into_string())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.inner)
            .map_err(|e| Error::InvalidTransaction(format!("transaction encoding failed: {}", e)))
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }
}
