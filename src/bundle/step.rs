//! Recipe steps and execution parameters
//!
//! `BundleStep` is a closed tagged union: spend estimation and mock data
//! generation match on it exhaustively, so adding a step kind is a
//! compile-time-checked change.

use serde::{Deserialize, Serialize};

/// How much SOL a buy step commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyAmount {
    /// Spend exactly this much SOL
    Exact { amount_sol: f64 },
    /// Spend up to `pct_cap` percent of the triggering base amount
    PctOfBase { pct_cap: f64 },
}

/// One intended on-chain action within a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BundleStep {
    /// Grant a program spending authority
    Approve { program: String },

    /// Acquire via the given route
    Buy { route: String, amount: BuyAmount },

    /// Post-trade guard: abort conditions checked on-chain
    Guard {
        min_out_pct: f64,
        max_impact_pct: f64,
        min_lp_sol: f64,
    },

    /// Dispose via the given route
    Sell { route: String, amount_sol: f64 },

    /// List on a marketplace program
    List { program: String, price_sol: f64 },
}

impl BundleStep {
    /// SOL this step spends from the wallet, given the automation's base
    /// amount. Only buys spend against the caps.
    pub fn spend_estimate(&self, base_amount_sol: f64) -> f64 {
        match self {
            BundleStep::Buy { amount, .. } => match amount {
                BuyAmount::Exact { amount_sol } => *amount_sol,
                BuyAmount::PctOfBase { pct_cap } => base_amount_sol * pct_cap / 100.0,
            },
            BundleStep::Approve { .. }
            | BundleStep::Guard { .. }
            | BundleStep::Sell { .. }
            | BundleStep::List { .. } => 0.0,
        }
    }

    /// Step kind name for logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            BundleStep::Approve { .. } => "approve",
            BundleStep::Buy { .. } => "buy",
            BundleStep::Guard { .. } => "guard",
            BundleStep::Sell { .. } => "sell",
            BundleStep::List { .. } => "list",
        }
    }
}

/// Total SOL a recipe would spend from the wallet
pub fn estimate_bundle_amount(recipe: &[BundleStep], base_amount_sol: f64) -> f64 {
    recipe
        .iter()
        .map(|step| step.spend_estimate(base_amount_sol))
        .sum()
}

/// Relay execution parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecParams {
    /// Priority fee per transaction
    pub priority_fee_lamports: u64,
    /// Relay tip per chunk
    pub tip_lamports: u64,
    /// Request MEV protection from the relay
    pub mev_protection: bool,
}

impl Default for ExecParams {
    fn default() -> Self {
        Self {
            priority_fee_lamports: 100000,
            tip_lamports: 10000,
            mev_protection: true,
        }
    }
}
