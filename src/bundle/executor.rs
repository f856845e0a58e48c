//! Bundle executor - chunk, sign, and relay a prepared recipe
//!
//! Chunks are processed strictly sequentially with a pacing pause between
//! submissions. One failed chunk never aborts its siblings: the pipeline
//! is partial-failure tolerant and reports per-chunk outcomes in the
//! aggregated result.

use std::sync::Arc;
use std::time::Duration;

use backoff::{future::retry, ExponentialBackoff};
use tracing::{debug, info, warn};

use crate::config::{ExecutorConfig, RelayConfig};
use crate::error::{Error, Result};
use crate::signer::PortfolioSigner;

use super::api::{BundleApi, RelayResult};
use super::pacer::{ChunkPacer, SleepPacer};
use super::step::{BundleStep, ExecParams};

/// One bundle execution request
#[derive(Debug, Clone)]
pub struct ExecuteBundleOptions {
    pub wallet_id: String,
    pub recipe: Vec<BundleStep>,
    pub exec: ExecParams,
    /// Opaque context forwarded to bundle preparation
    pub context: serde_json::Value,
    /// Per-call chunk size override
    pub max_txs_per_bundle: Option<usize>,
    /// Per-call pacing override
    pub rate_limit_ms: Option<u64>,
}

impl ExecuteBundleOptions {
    pub fn new(wallet_id: impl Into<String>, recipe: Vec<BundleStep>, exec: ExecParams) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            recipe,
            exec,
            context: serde_json::Value::Null,
            max_txs_per_bundle: None,
            rate_limit_ms: None,
        }
    }
}

/// Per-chunk accounting for an execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionDetails {
    pub chunks_processed: usize,
    pub total_txs: usize,
    pub failed_chunks: usize,
}

/// Aggregated outcome of one bundle execution
#[derive(Debug, Clone)]
pub struct BundleExecutionResult {
    /// True when at least one chunk landed
    pub success: bool,
    pub bundle_ids: Vec<String>,
    pub txids: Vec<String>,
    pub total_fees_lamports: u64,
    pub error: Option<String>,
    pub details: ExecutionDetails,
}

impl BundleExecutionResult {
    /// Failure before any chunk was processed
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            bundle_ids: Vec::new(),
            txids: Vec::new(),
            total_fees_lamports: 0,
            error: Some(error.into()),
            details: ExecutionDetails::default(),
        }
    }
}

/// Chunk→sign→relay pipeline
pub struct BundleExecutor {
    config: ExecutorConfig,
    relay: RelayConfig,
    api: Arc<dyn BundleApi>,
    portfolio: Arc<PortfolioSigner>,
    pacer: Arc<dyn ChunkPacer>,
}

impl BundleExecutor {
    pub fn new(
        config: ExecutorConfig,
        relay: RelayConfig,
        api: Arc<dyn BundleApi>,
        portfolio: Arc<PortfolioSigner>,
    ) -> Self {
        Self {
            config,
            relay,
            api,
            portfolio,
            pacer: Arc::new(SleepPacer),
        }
    }

    /// Replace the inter-chunk pacer
    pub fn with_pacer(mut self, pacer: Arc<dyn ChunkPacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Validate before any side effect
    fn validate_options(&self, options: &ExecuteBundleOptions) -> Result<()> {
        if options.recipe.is_empty() {
            return Err(Error::EmptyRecipe);
        }

        if options.recipe.len() > self.config.max_recipe_steps {
            return Err(Error::RecipeTooLong {
                got: options.recipe.len(),
                max: self.config.max_recipe_steps,
            });
        }

        if !self.portfolio.has_signer(&options.wallet_id) {
            return Err(Error::SignerMissing(options.wallet_id.clone()));
        }

        Ok(())
    }

    /// Execute a recipe end to end. Never returns Err: failures are
    /// reported in the result object so partial outcomes stay visible.
    pub async fn execute_bundle(&self, options: &ExecuteBundleOptions) -> BundleExecutionResult {
        if let Err(e) = self.validate_options(options) {
            warn!("Bundle rejected by validation: {}", e);
            return BundleExecutionResult::failure(e.to_string());
        }

        let prepared = match self
            .api
            .prepare_bundle(
                &options.wallet_id,
                &options.recipe,
                &options.exec,
                &options.context,
            )
            .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("Bundle preparation failed: {}", e);
                return BundleExecutionResult::failure(e.to_string());
            }
        };

        if prepared.txs_base58.is_empty() {
            return BundleExecutionResult::failure("Prepared bundle contained no transactions");
        }

        let chunk_size = options
            .max_txs_per_bundle
            .unwrap_or(self.config.max_txs_per_bundle)
            .max(1);
        let pace = Duration::from_millis(
            options.rate_limit_ms.unwrap_or(self.config.rate_limit_ms),
        );

        // Relays reject out-of-band tips outright; clamp before submission
        let mut exec = options.exec.clone();
        exec.tip_lamports = self.relay.clamp_tip(exec.tip_lamports);

        let chunks: Vec<&[String]> = prepared.txs_base58.chunks(chunk_size).collect();
        let total_txs = prepared.txs_base58.len();

        info!(
            "Executing bundle for wallet {}: {} txs in {} chunks of ≤{}",
            options.wallet_id,
            total_txs,
            chunks.len(),
            chunk_size
        );

        let mut result = BundleExecutionResult {
            success: false,
            bundle_ids: Vec::new(),
            txids: Vec::new(),
            total_fees_lamports: 0,
            error: None,
            details: ExecutionDetails {
                chunks_processed: 0,
                total_txs,
                failed_chunks: 0,
            },
        };
        let mut last_error: Option<String> = None;

        for (index, chunk) in chunks.iter().enumerate() {
            result.details.chunks_processed += 1;

            match self.process_chunk(&options.wallet_id, chunk, &exec).await {
                Ok(relay) if relay.success => {
                    debug!(
                        "Chunk {}/{} landed: bundle {:?}",
                        index + 1,
                        chunks.len(),
                        relay.bundle_id
                    );
                    if let Some(id) = relay.bundle_id {
                        result.bundle_ids.push(id);
                    }
                    result.txids.extend(relay.txids);
                    result.total_fees_lamports += self.chunk_fee(chunk.len(), &exec);
                }
                Ok(relay) => {
                    let reason = relay
                        .reason
                        .unwrap_or_else(|| "relay rejected bundle".to_string());
                    warn!("Chunk {}/{} rejected: {}", index + 1, chunks.len(), reason);
                    result.details.failed_chunks += 1;
                    last_error = Some(reason);
                }
                Err(e) => {
                    warn!("Chunk {}/{} failed: {}", index + 1, chunks.len(), e);
                    result.details.failed_chunks += 1;
                    last_error = Some(e.to_string());
                }
            }

            if index + 1 < chunks.len() {
                self.pacer.pause(pace).await;
            }
        }

        let succeeded = result.details.chunks_processed - result.details.failed_chunks;
        result.success = succeeded >= 1;
        if !result.success {
            result.error = Some(last_error.unwrap_or_else(|| "All chunks failed".to_string()));
        }

        info!(
            "Bundle execution for wallet {} finished: {}/{} chunks landed",
            options.wallet_id,
            succeeded,
            result.details.chunks_processed
        );

        result
    }

    /// Sign and relay one chunk
    async fn process_chunk(
        &self,
        wallet_id: &str,
        chunk: &[String],
        exec: &ExecParams,
    ) -> Result<RelayResult> {
        let signed = self.portfolio.sign_base58(wallet_id, chunk).await?;
        self.relay_with_retry(wallet_id, &signed, exec).await
    }

    /// Submit one signed chunk, retrying transient relay errors
    async fn relay_with_retry(
        &self,
        wallet_id: &str,
        signed: &[String],
        exec: &ExecParams,
    ) -> Result<RelayResult> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(self.relay.retry_base_delay_ms),
            max_interval: Duration::from_millis(self.relay.retry_base_delay_ms * 4),
            max_elapsed_time: Some(Duration::from_millis(500)),
            ..Default::default()
        };

        retry(backoff, || async {
            match self.api.relay_bundle(wallet_id, signed, exec).await {
                Ok(result) => Ok(result),
                Err(e) if e.is_retryable() => {
                    warn!("Retryable relay error: {}", e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    /// Fee charged for a landed chunk
    fn chunk_fee(&self, tx_count: usize, exec: &ExecParams) -> u64 {
        let per_tx = self.config.base_fee_lamports + exec.priority_fee_lamports;
        tx_count as u64 * per_tx + exec.tip_lamports
    }
}
