//! Keypair-backed signer
//!
//! Default `WalletSigner` implementation over a locally held keypair.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;

use crate::error::{Error, Result};

use super::WalletSigner;

/// Signer holding a keypair in process memory.
///
/// The keypair never leaves this struct: `Debug` prints the public key only,
/// and there is no accessor for the secret bytes.
pub struct LocalKeypairSigner {
    keypair: Keypair,
}

impl LocalKeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load from the standard JSON keypair byte array
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let keypair = Keypair::from_bytes(bytes)
            .map_err(|e| Error::SigningFailed(format!("Invalid keypair bytes: {}", e)))?;
        Ok(Self { keypair })
    }
}

impl std::fmt::Debug for LocalKeypairSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeypairSigner")
            .field("pubkey", &self.keypair.pubkey())
            .finish()
    }
}

#[async_trait]
impl WalletSigner for LocalKeypairSigner {
    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_sign(&[&self.keypair], blockhash)
            .map_err(|e| Error::SigningFailed(e.to_string()))?;
        Ok(tx)
    }

    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::system_instruction;

    #[tokio::test]
    async fn test_sign_transaction() {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let signer = LocalKeypairSigner::new(keypair);

        let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1);
        let tx = Transaction::new_with_payer(&[ix], Some(&payer));
        assert!(!tx.is_signed());

        let signed = signer.sign_transaction(tx).await.unwrap();
        assert!(signed.is_signed());
    }

    #[tokio::test]
    async fn test_sign_fails_for_foreign_payer() {
        let signer = LocalKeypairSigner::new(Keypair::new());
        let foreign = Keypair::new().pubkey();

        let ix = system_instruction::transfer(&foreign, &Pubkey::new_unique(), 1);
        let tx = Transaction::new_with_payer(&[ix], Some(&foreign));

        let result = signer.sign_transaction(tx).await;
        assert!(matches!(result, Err(Error::SigningFailed(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let keypair = Keypair::new();
        let pubkey = keypair.pubkey().to_string();
        let secret = bs58::encode(keypair.to_bytes()).into_string();

        let debug = format!("{:?}", LocalKeypairSigner::new(keypair));
        assert!(debug.contains(&pubkey));
        assert!(!debug.contains(&secret));
    }
}
