//! Wallet signing capabilities
//!
//! A `WalletSigner` signs transactions for exactly one wallet and never
//! exposes key material. The `PortfolioSigner` keeps the wallet→signer
//! registry and handles wire encoding for the relay pipeline.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;

use crate::error::Result;

pub mod local;
pub mod portfolio;
pub mod types;

pub use local::LocalKeypairSigner;
pub use portfolio::PortfolioSigner;
pub use types::WalletInfo;

/// Signing capability for a single wallet.
///
/// Contract: implementations must never log, serialize, or otherwise leak
/// private-key material.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Sign a single transaction
    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction>;

    /// Sign a batch of transactions in order
    async fn sign_all_transactions(&self, txs: Vec<Transaction>) -> Result<Vec<Transaction>> {
        let mut signed = Vec::with_capacity(txs.len());
        for tx in txs {
            signed.push(self.sign_transaction(tx).await?);
        }
        Ok(signed)
    }

    /// Public key this signer signs for
    fn pubkey(&self) -> Pubkey;
}
