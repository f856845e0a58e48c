//! Core wallet types

use serde::{Deserialize, Serialize};

/// Wallet descriptor supplied by the wallet-management subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    /// Unique identifier (lowercase, no spaces): "hot-trading"
    pub id: String,

    /// Base58 wallet address
    pub address: String,

    /// Current balance in SOL, as reported by the caller
    pub balance_sol: f64,
}

impl WalletInfo {
    pub fn new(id: impl Into<String>, address: impl Into<String>, balance_sol: f64) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            balance_sol,
        }
    }
}
