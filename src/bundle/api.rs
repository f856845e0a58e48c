//! Relay API seam
//!
//! The remote prepare/relay/simulate surface this core consumes. Real
//! backends and test doubles are swappable behind `BundleApi`; impls carry
//! their own network timeouts.

use async_trait::async_trait;

use crate::error::Result;

use super::step::{BundleStep, ExecParams};

/// Unsigned transactions prepared by the relay service
#[derive(Debug, Clone)]
pub struct PreparedBundle {
    /// Ordered opaque unsigned-transaction blobs, base58
    pub txs_base58: Vec<String>,
    /// Route metadata, passed through untouched
    pub route_meta: serde_json::Value,
}

/// Outcome of relaying one chunk
#[derive(Debug, Clone)]
pub struct RelayResult {
    pub success: bool,
    pub bundle_id: Option<String>,
    pub txids: Vec<String>,
    pub reason: Option<String>,
}

impl RelayResult {
    pub fn accepted(bundle_id: impl Into<String>, txids: Vec<String>) -> Self {
        Self {
            success: true,
            bundle_id: Some(bundle_id.into()),
            txids,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            bundle_id: None,
            txids: Vec::new(),
            reason: Some(reason.into()),
        }
    }
}

/// Simulation estimates for a recipe
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Estimated price impact in percent
    pub impact_pct: f64,
    /// Estimated total fees in lamports
    pub fees_lamports: u64,
    /// Route the relay would take
    pub route: serde_json::Value,
    pub warnings: Vec<String>,
}

/// Remote block-space auction service
#[async_trait]
pub trait BundleApi: Send + Sync {
    /// Turn a recipe into unsigned transactions
    async fn prepare_bundle(
        &self,
        wallet_id: &str,
        recipe: &[BundleStep],
        exec: &ExecParams,
        context: &serde_json::Value,
    ) -> Result<PreparedBundle>;

    /// Submit one signed chunk (base64-encoded transactions)
    async fn relay_bundle(
        &self,
        wallet_id: &str,
        signed_txs: &[String],
        exec: &ExecParams,
    ) -> Result<RelayResult>;

    /// Dry-run a recipe for impact/fee estimates
    async fn simulate_bundle(
        &self,
        wallet_id: &str,
        recipe: &[BundleStep],
        exec: &ExecParams,
    ) -> Result<SimulationReport>;
}
