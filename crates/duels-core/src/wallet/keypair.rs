//! Wallet backed by a local ed25519 keypair.
//!
//! Reads the Solana CLI keypair format: a JSON array of 64 bytes, secret key
//! followed by public key.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use ed25519_dalek::{Signer, SigningKey};
use solana_signature::Signature;
use tracing::{info, warn};

use super::{LedgerClient, Pubkey, Transaction, WalletConnector, WalletProvider};
use crate::{Error, Result};

const KEYPAIR_BYTES: usize = 64;

pub struct KeypairWallet {
    key: SigningKey,
    connected: AtomicBool,
}

impl KeypairWallet {
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
            connected: AtomicBool::new(false),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            warn!(error = %e, path = %path.display(), "Failed to read keypair file");
            Error::WalletUnavailable
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let bytes: Vec<u8> = serde_json::from_str(contents).map_err(|e| {
            warn!(error = %e, "Keypair file is not a JSON byte array");
            Error::WalletUnavailable
        })?;
        if bytes.len() != KEYPAIR_BYTES {
            warn!(len = bytes.len(), "Keypair file has the wrong length");
            return Err(Error::WalletUnavailable);
        }

        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes[..32]);
        let wallet = Self::from_secret(&secret);

        if wallet.pubkey().as_ref() != &bytes[32..] {
            warn!("Keypair public half does not match its secret");
            return Err(Error::WalletUnavailable);
        }
        Ok(wallet)
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.key.verifying_key().to_bytes())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::WalletRejected("wallet is not connected".to_string()))
        }
    }
}

impl WalletProvider for KeypairWallet {
    async fn connect(&self) -> Result<Pubkey> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(self.pubkey())
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        Ok(self.key.sign(message).to_bytes().to_vec())
    }

    async fn sign_and_send_transaction<L: LedgerClient>(
        &self,
        mut tx: Transaction,
        ledger: &L,
    ) -> Result<String> {
        self.ensure_connected()?;

        let message = tx.message_data()?;
        let signature = Signature::from(self.key.sign(&message).to_bytes());
        tx.add_signature(&self.pubkey(), signature)?;
        if !tx.is_fully_signed() {
            return Err(Error::InvalidTransaction(
                "transaction needs signatures this wallet cannot provide".to_string(),
            ));
        }

        let submitted = ledger.send_transaction(&tx).await?;
        info!(signature = %submitted, "Transaction sent");
        Ok(submitted)
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens a `KeypairWallet` from a keypair file.
#[derive(Debug, Clone, Default)]
pub struct KeypairConnector {
    path: Option<PathBuf>,
}

impl KeypairConnector {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl WalletConnector for KeypairConnector {
    type Provider = KeypairWallet;

    fn open(&self) -> Result<KeypairWallet> {
        let path = self.path.as_deref().ok_or(Error::WalletUnavailable)?;
        KeypairWallet::from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ed25519_dalek::{Signature, Verifier};

    use super::*;
    use crate::wallet::transaction::tests::unsigned_transaction;
    use crate::wallet::TokenAmount;

    #[derive(Default)]
    struct RecordingLedger {
        sent: Mutex<Vec<Transaction>>,
    }

    impl LedgerClient for RecordingLedger {
        async fn token_account_balance(&self, _account: &Pubkey) -> Result<Option<TokenAmount>> {
            Ok(None)
        }

        async fn send_transaction(&self, tx: &Transaction) -> Result<String> {
            self.sent.lock().expect("lock").push(tx.clone());
            tx.id().ok_or_else(|| Error::SubmissionRejected("unsigned".to_string()))
        }
    }

    fn keypair_json(secret: [u8; 32]) -> String {
        let wallet = KeypairWallet::from_secret(&secret);
        let mut bytes = secret.to_vec();
        bytes.extend_from_slice(wallet.pubkey().as_ref());
        serde_json::to_string(&bytes).expect("serialize keypair")
    }

    #[tokio::test]
    async fn test_sign_message_verifies() {
        let wallet = KeypairWallet::from_secret(&[11u8; 32]);
        let address = wallet.connect().await.expect("connect");
        let message = address.to_string();

        let raw = wallet.sign_message(message.as_bytes()).await.expect("sign");
        let signature = Signature::from_slice(&raw).expect("64-byte signature");
        assert!(wallet
            .key
            .verifying_key()
            .verify(message.as_bytes(), &signature)
            .is_ok());
    }

    #[tokio::test]
    async fn test_signing_requires_connection() {
        let wallet = KeypairWallet::from_secret(&[11u8; 32]);
        assert!(matches!(
            wallet.sign_message(b"hello").await,
            Err(Error::WalletRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_and_send_fills_own_slot() {
        let wallet = KeypairWallet::from_secret(&[12u8; 32]);
        wallet.connect().await.expect("connect");
        let tx = Transaction::from_bytes(&unsigned_transaction(&[wallet.pubkey()], false))
            .expect("valid transaction");
        let ledger = RecordingLedger::default();

        let signature = wallet
            .sign_and_send_transaction(tx, &ledger)
            .await
            .expect("sent");

        let sent = ledger.sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_fully_signed());
        assert_eq!(sent[0].id(), Some(signature.clone()));

        let raw = bs58::decode(&signature).into_vec().expect("base58 signature");
        let signature = Signature::from_slice(&raw).expect("64-byte signature");
        let message = sent[0].message_data().expect("message bytes");
        assert!(wallet.key.verifying_key().verify(&message, &signature).is_ok());
    }

    #[tokio::test]
    async fn test_missing_cosigner_is_not_sent() {
        let wallet = KeypairWallet::from_secret(&[12u8; 32]);
        wallet.connect().await.expect("connect");
        let cosigner = Pubkey::new_from_array([2u8; 32]);
        let tx = Transaction::from_bytes(&unsigned_transaction(&[wallet.pubkey(), cosigner], false))
            .expect("valid transaction");
        let ledger = RecordingLedger::default();

        let result = wallet.sign_and_send_transaction(tx, &ledger).await;
        assert!(matches!(result, Err(Error::InvalidTransaction(_))));
        assert!(ledger.sent.lock().expect("lock").is_empty());
    }

    #[test]
    fn test_keypair_json_parsing() {
        let wallet = KeypairWallet::from_json(&keypair_json([5u8; 32])).expect("valid keypair");
        assert_eq!(wallet.pubkey(), KeypairWallet::from_secret(&[5u8; 32]).pubkey());

        assert!(KeypairWallet::from_json("[1,2,3]").is_err());
        assert!(KeypairWallet::from_json("not json").is_err());

        let mut mismatched: Vec<u8> = serde_json::from_str(&keypair_json([5u8; 32])).expect("bytes");
        mismatched[40] ^= 0xff;
        let mismatched = serde_json::to_string(&mismatched).expect("serialize");
        assert!(KeypairWallet::from_json(&mismatched).is_err());
    }

    #[test]
    fn test_connector_without_path_is_unavailable() {
        assert!(matches!(
            KeypairConnector::new(None).open(),
            Err(Error::WalletUnavailable)
        ));
    }
}
