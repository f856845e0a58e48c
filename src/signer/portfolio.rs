//! Portfolio signer registry
//!
//! Maps wallet ids to signing capabilities and handles the wire encoding
//! used by the relay pipeline: unsigned transactions arrive as base58
//! blobs, signed transactions leave as base64 strings.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dashmap::DashMap;
use solana_sdk::transaction::Transaction;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::WalletSigner;

/// Registry of wallet→signer capabilities.
///
/// One instance per process, injected into the components that sign.
/// Key material stays inside the registered signers; this registry only
/// ever handles transactions.
#[derive(Default)]
pub struct PortfolioSigner {
    signers: DashMap<String, Arc<dyn WalletSigner>>,
}

impl PortfolioSigner {
    pub fn new() -> Self {
        Self {
            signers: DashMap::new(),
        }
    }

    /// Associate a signer with a wallet, overwriting any prior one
    pub fn register_wallet_signer(&self, wallet_id: &str, signer: Arc<dyn WalletSigner>) {
        let replaced = self
            .signers
            .insert(wallet_id.to_string(), signer)
            .is_some();
        if replaced {
            info!("Replaced signer for wallet {}", wallet_id);
        } else {
            debug!("Registered signer for wallet {}", wallet_id);
        }
    }

    /// Check whether a wallet has a registered signer
    pub fn has_signer(&self, wallet_id: &str) -> bool {
        self.signers.contains_key(wallet_id)
    }

    /// List all wallet ids with a registered signer
    pub fn registered_wallets(&self) -> Vec<String> {
        self.signers.iter().map(|e| e.key().clone()).collect()
    }

    /// Remove a wallet's signer. Returns true if one was registered.
    pub fn remove_wallet_signer(&self, wallet_id: &str) -> bool {
        self.signers.remove(wallet_id).is_some()
    }

    /// Drop every registered signer
    pub fn clear_all_signers(&self) {
        self.signers.clear();
    }

    /// Sign a single transaction for a wallet
    pub async fn sign_transaction(&self, wallet_id: &str, tx: Transaction) -> Result<Transaction> {
        let signer = self.lookup(wallet_id)?;
        signer.sign_transaction(tx).await
    }

    /// Sign a batch of transactions for a wallet, preserving order
    pub async fn sign_all_transactions(
        &self,
        wallet_id: &str,
        txs: Vec<Transaction>,
    ) -> Result<Vec<Transaction>> {
        let signer = self.lookup(wallet_id)?;
        signer.sign_all_transactions(txs).await
    }

    /// Sign base58-encoded unsigned transactions, returning base64 strings
    /// ready for relay submission
    pub async fn sign_base58(&self, wallet_id: &str, txs_base58: &[String]) -> Result<Vec<String>> {
        let signer = self.lookup(wallet_id)?;

        let mut decoded = Vec::with_capacity(txs_base58.len());
        for blob in txs_base58 {
            let bytes = bs58::decode(blob)
                .into_vec()
                .map_err(|e| Error::TransactionDecode(format!("Invalid base58: {}", e)))?;
            let tx: Transaction = bincode::deserialize(&bytes)
                .map_err(|e| Error::TransactionDecode(format!("Invalid transaction: {}", e)))?;
            decoded.push(tx);
        }

        let signed = signer.sign_all_transactions(decoded).await?;

        signed
            .iter()
            .map(|tx| {
                let bytes = bincode::serialize(tx)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                Ok(BASE64.encode(bytes))
            })
            .collect()
    }

    fn lookup(&self, wallet_id: &str) -> Result<Arc<dyn WalletSigner>> {
        self.signers
            .get(wallet_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::SignerMissing(wallet_id.to_string()))
    }
}
