//! Automation requests and their recipes
//!
//! Each automation type builds a fixed recipe shape; limits and triggers
//! originate in a separate configuration subsystem and arrive here as
//! request structs.

use serde::{Deserialize, Serialize};

use crate::bundle::step::{BundleStep, BuyAmount, ExecParams};

/// Guard step parameters shared by the automation types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardParams {
    /// Minimum acceptable output, percent of the quoted amount
    pub min_out_pct: f64,
    /// Maximum tolerated price impact in percent
    pub max_impact_pct: f64,
    /// Minimum pool liquidity in SOL
    pub min_lp_sol: f64,
}

impl Default for GuardParams {
    fn default() -> Self {
        Self {
            min_out_pct: 90.0,
            max_impact_pct: 5.0,
            min_lp_sol: 10.0,
        }
    }
}

/// Mirror a trade observed from another wallet
#[derive(Debug, Clone)]
pub struct CopyTradeRequest {
    pub wallet_id: String,
    pub automation_id: String,
    /// Wallet whose trade is being mirrored
    pub source_wallet: String,
    /// Program needing spend approval before the buy
    pub program: String,
    pub route: String,
    /// SOL amount of the observed trade
    pub observed_amount_sol: f64,
    /// Percentage of the observed amount to mirror, at most
    pub pct_cap: f64,
    pub guard: GuardParams,
    pub exec: ExecParams,
}

/// Buy a fixed amount at token launch
#[derive(Debug, Clone)]
pub struct SnipeRequest {
    pub wallet_id: String,
    pub automation_id: String,
    pub route: String,
    pub amount_sol: f64,
    pub guard: GuardParams,
    pub exec: ExecParams,
}

/// Caller-assembled recipe
#[derive(Debug, Clone)]
pub struct BundlerRequest {
    pub wallet_id: String,
    pub automation_id: Option<String>,
    pub recipe: Vec<BundleStep>,
    /// Base amount for percent-capped buy steps in the recipe
    pub base_amount_sol: f64,
    pub exec: ExecParams,
}

/// approve → buy (pct of observed) → guard
pub fn copy_trade_recipe(req: &CopyTradeRequest) -> Vec<BundleStep> {
    vec![
        BundleStep::Approve {
            program: req.program.clone(),
        },
        BundleStep::Buy {
            route: req.route.clone(),
            amount: BuyAmount::PctOfBase {
                pct_cap: req.pct_cap,
            },
        },
        BundleStep::Guard {
            min_out_pct: req.guard.min_out_pct,
            max_impact_pct: req.guard.max_impact_pct,
            min_lp_sol: req.guard.min_lp_sol,
        },
    ]
}

/// buy (exact) → guard
pub fn snipe_recipe(req: &SnipeRequest) -> Vec<BundleStep> {
    vec![
        BundleStep::Buy {
            route: req.route.clone(),
            amount: BuyAmount::Exact {
                amount_sol: req.amount_sol,
            },
        },
        BundleStep::Guard {
            min_out_pct: req.guard.min_out_pct,
            max_impact_pct: req.guard.max_impact_pct,
            min_lp_sol: req.guard.min_lp_sol,
        },
    ]
}
