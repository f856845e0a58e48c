//! Test doubles for the relay seam
//!
//! `MockBundleApi` fabricates unsigned transactions for a recipe, verifies
//! signatures on relay, and counts calls so tests can assert that rejected
//! executions never reach the relay. Relay faults are opt-in: a
//! deterministic per-call set, or a random failure rate for soak-style
//! tests. Neither is ever production behavior.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dashmap::DashMap;
use rand::Rng;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;

use crate::error::{Error, Result};

use super::api::{BundleApi, PreparedBundle, RelayResult, SimulationReport};
use super::step::{BundleStep, BuyAmount, ExecParams};

pub use super::pacer::NoopPacer;

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// In-memory `BundleApi` double
#[derive(Default)]
pub struct MockBundleApi {
    payers: DashMap<String, Pubkey>,
    txs_per_step: usize,
    failure_rate: f64,
    fail_calls: Mutex<HashSet<usize>>,
    chunk_sizes: Mutex<Vec<usize>>,
    prepare_count: AtomicUsize,
    relay_count: AtomicUsize,
    simulate_count: AtomicUsize,
}

impl MockBundleApi {
    pub fn new() -> Self {
        Self {
            txs_per_step: 1,
            ..Default::default()
        }
    }

    /// Unsigned transactions fabricated per recipe step
    pub fn with_txs_per_step(mut self, count: usize) -> Self {
        self.txs_per_step = count.max(1);
        self
    }

    /// Random relay failure probability in [0, 1]. Defaults to 0.0.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// The mock fabricates transactions paid by this pubkey, so the
    /// registered signer for the wallet must hold the matching keypair
    pub fn register_payer(&self, wallet_id: &str, payer: Pubkey) {
        self.payers.insert(wallet_id.to_string(), payer);
    }

    /// Make the nth relay call (0-based) fail with an injected fault
    pub fn fail_relay_call(&self, call_index: usize) {
        self.fail_calls
            .lock()
            .expect("fail_calls poisoned")
            .insert(call_index);
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepare_count.load(Ordering::SeqCst)
    }

    pub fn relay_calls(&self) -> usize {
        self.relay_count.load(Ordering::SeqCst)
    }

    pub fn simulate_calls(&self) -> usize {
        self.simulate_count.load(Ordering::SeqCst)
    }

    /// Sizes of the chunks relayed so far, in call order
    pub fn relayed_chunk_sizes(&self) -> Vec<usize> {
        self.chunk_sizes.lock().expect("chunk_sizes poisoned").clone()
    }

    fn fabricate_lamports(step: &BundleStep) -> u64 {
        match step {
            BundleStep::Approve { .. } => 1,
            BundleStep::Buy { amount, .. } => match amount {
                BuyAmount::Exact { amount_sol } => (amount_sol * LAMPORTS_PER_SOL) as u64,
                BuyAmount::PctOfBase { pct_cap } => (pct_cap * 1000.0) as u64,
            },
            BundleStep::Guard { .. } => 1,
            BundleStep::Sell { amount_sol, .. } => (amount_sol * LAMPORTS_PER_SOL) as u64,
            BundleStep::List { price_sol, .. } => (price_sol * LAMPORTS_PER_SOL) as u64,
        }
        .max(1)
    }
}

#[async_trait]
impl BundleApi for MockBundleApi {
    async fn prepare_bundle(
        &self,
        wallet_id: &str,
        recipe: &[BundleStep],
        _exec: &ExecParams,
        _context: &serde_json::Value,
    ) -> Result<PreparedBundle> {
        self.prepare_count.fetch_add(1, Ordering::SeqCst);

        let payer = self
            .payers
            .get(wallet_id)
            .map(|e| *e.value())
            .ok_or_else(|| {
                Error::PrepareFailed(format!("No payer registered for wallet {}", wallet_id))
            })?;

        let mut txs_base58 = Vec::new();
        for step in recipe {
            let lamports = Self::fabricate_lamports(step);
            for _ in 0..self.txs_per_step {
                let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), lamports);
                let tx = Transaction::new_with_payer(&[ix], Some(&payer));
                let bytes = bincode::serialize(&tx)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                txs_base58.push(bs58::encode(bytes).into_string());
            }
        }

        Ok(PreparedBundle {
            txs_base58,
            route_meta: serde_json::json!({
                "steps": recipe.len(),
                "kinds": recipe.iter().map(|s| s.kind_name()).collect::<Vec<_>>(),
            }),
        })
    }

    async fn relay_bundle(
        &self,
        _wallet_id: &str,
        signed_txs: &[String],
        _exec: &ExecParams,
    ) -> Result<RelayResult> {
        let call_index = self.relay_count.fetch_add(1, Ordering::SeqCst);
        self.chunk_sizes
            .lock()
            .expect("chunk_sizes poisoned")
            .push(signed_txs.len());

        if self
            .fail_calls
            .lock()
            .expect("fail_calls poisoned")
            .contains(&call_index)
        {
            return Err(Error::RelayRejected(format!(
                "Injected fault on relay call {}",
                call_index
            )));
        }

        if self.failure_rate > 0.0 && rand::thread_rng().gen::<f64>() < self.failure_rate {
            return Ok(RelayResult::rejected("Injected relay congestion"));
        }

        let mut txids = Vec::with_capacity(signed_txs.len());
        let mut hasher = Sha256::new();
        for encoded in signed_txs {
            let bytes = BASE64
                .decode(encoded)
                .map_err(|e| Error::Deserialization(format!("Invalid base64: {}", e)))?;
            let tx: Transaction = bincode::deserialize(&bytes)
                .map_err(|e| Error::Deserialization(format!("Invalid transaction: {}", e)))?;

            if !tx.is_signed() {
                return Ok(RelayResult::rejected("Unsigned transaction in bundle"));
            }

            let signature = tx.signatures[0];
            hasher.update(signature.as_ref());
            txids.push(signature.to_string());
        }

        let digest = hasher.finalize();
        let bundle_id = format!("bundle_{}", &bs58::encode(&digest[..]).into_string()[..16]);

        Ok(RelayResult::accepted(bundle_id, txids))
    }

    async fn simulate_bundle(
        &self,
        _wallet_id: &str,
        recipe: &[BundleStep],
        exec: &ExecParams,
    ) -> Result<SimulationReport> {
        self.simulate_count.fetch_add(1, Ordering::SeqCst);

        Ok(SimulationReport {
            impact_pct: 0.3,
            fees_lamports: recipe.len() as u64 * 5000 + exec.priority_fee_lamports,
            route: serde_json::json!({
                "kinds": recipe.iter().map(|s| s.kind_name()).collect::<Vec<_>>(),
            }),
            warnings: Vec::new(),
        })
    }
}
