//! Bundler integration facade
//!
//! Composes the caps manager's safety rails around the bundle executor for
//! each automation type. Every execution attempt walks a fixed state
//! machine: a failed safety check rejects before anything is reserved, and
//! every reservation is released on every non-success path.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bundle::api::{BundleApi, SimulationReport};
use crate::bundle::executor::{BundleExecutionResult, BundleExecutor, ExecuteBundleOptions};
use crate::bundle::pacer::ChunkPacer;
use crate::bundle::step::{estimate_bundle_amount, BundleStep, ExecParams};
use crate::caps::journal::SpendJournal;
use crate::caps::manager::{CapsManager, SafetyCheck};
use crate::caps::spending::SpendKind;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::signer::{PortfolioSigner, WalletInfo, WalletSigner};

pub mod recipes;

pub use recipes::{
    copy_trade_recipe, snipe_recipe, BundlerRequest, CopyTradeRequest, GuardParams, SnipeRequest,
};

/// Phases of one execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Idle,
    SafetyCheck,
    Rejected,
    Reserved,
    Executing,
    Committed,
    FailedReleased,
}

impl ExecutionPhase {
    /// Rejected, Committed, and FailedReleased are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionPhase::Rejected | ExecutionPhase::Committed | ExecutionPhase::FailedReleased
        )
    }

    /// Legal transitions of the attempt state machine
    pub fn can_transition_to(&self, next: ExecutionPhase) -> bool {
        use ExecutionPhase::*;
        matches!(
            (self, next),
            (Idle, SafetyCheck)
                | (Idle, Executing)
                | (SafetyCheck, Rejected)
                | (SafetyCheck, Reserved)
                | (Reserved, Executing)
                | (Executing, Committed)
                | (Executing, FailedReleased)
        )
    }
}

impl std::fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutionPhase::Idle => "idle",
            ExecutionPhase::SafetyCheck => "safety_check",
            ExecutionPhase::Rejected => "rejected",
            ExecutionPhase::Reserved => "reserved",
            ExecutionPhase::Executing => "executing",
            ExecutionPhase::Committed => "committed",
            ExecutionPhase::FailedReleased => "failed_released",
        };
        write!(f, "{}", name)
    }
}

/// Accounting identity of one execution attempt
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub wallet_id: String,
    pub kind: SpendKind,
    pub automation_id: Option<String>,
    /// Base amount for percent-capped buy steps
    pub base_amount_sol: f64,
}

/// Simulation estimates combined with a cap/rate preview
#[derive(Debug, Clone)]
pub struct BundleSimulation {
    pub report: SimulationReport,
    pub safety: SafetyCheck,
}

/// Facade wiring caps, signers, and the executor together
pub struct BundlerIntegration {
    config: Config,
    caps: Arc<CapsManager>,
    portfolio: Arc<PortfolioSigner>,
    executor: BundleExecutor,
    api: Arc<dyn BundleApi>,
    journal: Option<SpendJournal>,
}

impl BundlerIntegration {
    pub fn new(config: Config, api: Arc<dyn BundleApi>) -> Self {
        let caps = Arc::new(CapsManager::new(config.caps.clone()));
        let portfolio = Arc::new(PortfolioSigner::new());
        let executor = BundleExecutor::new(
            config.executor.clone(),
            config.relay.clone(),
            api.clone(),
            portfolio.clone(),
        );
        let journal = config.journal_path.as_ref().map(SpendJournal::new);

        Self {
            config,
            caps,
            portfolio,
            executor,
            api,
            journal,
        }
    }

    /// Replace the executor's inter-chunk pacer
    pub fn with_pacer(mut self, pacer: Arc<dyn ChunkPacer>) -> Self {
        self.executor = BundleExecutor::new(
            self.config.executor.clone(),
            self.config.relay.clone(),
            self.api.clone(),
            self.portfolio.clone(),
        )
        .with_pacer(pacer);
        self
    }

    /// Seed caps and register signers for a set of wallets
    pub async fn initialize(&self, wallets: Vec<(WalletInfo, Arc<dyn WalletSigner>)>) {
        let caps = &self.config.caps;
        let count = wallets.len();

        for (info, signer) in wallets {
            let daily_cap = (info.balance_sol * caps.daily_cap_balance_pct)
                .min(caps.daily_cap_max_sol);
            let per_bundle_cap = (info.balance_sol * caps.per_bundle_balance_pct)
                .min(caps.per_bundle_cap_max_sol);

            self.caps
                .initialize_wallet_cap(&info.id, daily_cap, per_bundle_cap)
                .await;
            self.portfolio.register_wallet_signer(&info.id, signer);
        }

        info!("Bundler integration initialized with {} wallets", count);
    }

    /// Mirror an observed trade as an approve→buy→guard bundle
    pub async fn execute_copy_as_bundle(&self, req: CopyTradeRequest) -> BundleExecutionResult {
        let recipe = copy_trade_recipe(&req);
        let context = ExecutionContext {
            wallet_id: req.wallet_id.clone(),
            kind: SpendKind::CopyTrade,
            automation_id: Some(req.automation_id.clone()),
            base_amount_sol: req.observed_amount_sol,
        };
        let extra = serde_json::json!({
            "source_wallet": req.source_wallet,
            "observed_amount_sol": req.observed_amount_sol,
        });
        self.execute_bundle(context, recipe, req.exec, extra).await
    }

    /// Launch snipe as a buy→guard bundle
    pub async fn execute_snipe_as_bundle(&self, req: SnipeRequest) -> BundleExecutionResult {
        let recipe = snipe_recipe(&req);
        let context = ExecutionContext {
            wallet_id: req.wallet_id.clone(),
            kind: SpendKind::Snipe,
            automation_id: Some(req.automation_id.clone()),
            base_amount_sol: 0.0,
        };
        self.execute_bundle(context, recipe, req.exec, serde_json::Value::Null)
            .await
    }

    /// Execute a caller-assembled recipe
    pub async fn execute_bundler_automation(&self, req: BundlerRequest) -> BundleExecutionResult {
        let context = ExecutionContext {
            wallet_id: req.wallet_id.clone(),
            kind: SpendKind::Bundler,
            automation_id: req.automation_id.clone(),
            base_amount_sol: req.base_amount_sol,
        };
        self.execute_bundle(context, req.recipe, req.exec, serde_json::Value::Null)
            .await
    }

    /// Shared execution path: safety-check → reserve → execute → record →
    /// compensate on failure
    pub async fn execute_bundle(
        &self,
        context: ExecutionContext,
        recipe: Vec<BundleStep>,
        exec: ExecParams,
        extra_context: serde_json::Value,
    ) -> BundleExecutionResult {
        let mut phase = ExecutionPhase::Idle;
        let wallet_id = context.wallet_id.clone();
        let estimated = estimate_bundle_amount(&recipe, context.base_amount_sol);
        let safety_enabled = self.config.caps.safety_checks_enabled;

        if safety_enabled {
            self.advance(&mut phase, ExecutionPhase::SafetyCheck, &wallet_id);

            let check = self.caps.perform_safety_check(&wallet_id, estimated).await;
            for warning in &check.warnings {
                warn!("Safety warning for wallet {}: {}", wallet_id, warning);
            }
            if !check.passed {
                self.advance(&mut phase, ExecutionPhase::Rejected, &wallet_id);
                let error = Error::SafetyRejected {
                    reasons: check.errors,
                };
                warn!("Bundle rejected for wallet {}: {}", wallet_id, error);
                return BundleExecutionResult::failure(error.to_string());
            }

            let reserved = self
                .caps
                .reserve_spending(
                    &wallet_id,
                    estimated,
                    context.kind,
                    context.automation_id.clone(),
                )
                .await;
            if !reserved {
                self.advance(&mut phase, ExecutionPhase::Rejected, &wallet_id);
                let error = Error::ReservationFailed {
                    wallet: wallet_id.clone(),
                    amount: estimated,
                };
                return BundleExecutionResult::failure(error.to_string());
            }
            self.advance(&mut phase, ExecutionPhase::Reserved, &wallet_id);
        }

        self.advance(&mut phase, ExecutionPhase::Executing, &wallet_id);

        let mut options = ExecuteBundleOptions::new(wallet_id.clone(), recipe, exec);
        options.context = extra_context;
        let result = self.executor.execute_bundle(&options).await;

        // Failed attempts throttle too
        if safety_enabled {
            self.caps.record_execution(&wallet_id).await;
        }

        if result.success {
            self.advance(&mut phase, ExecutionPhase::Committed, &wallet_id);
            self.snapshot_journal(&wallet_id).await;
        } else if safety_enabled {
            self.caps.release_spending(&wallet_id, estimated).await;
            self.advance(&mut phase, ExecutionPhase::FailedReleased, &wallet_id);
            info!(
                "Released {} SOL reservation for wallet {} after failed execution",
                estimated, wallet_id
            );
        }

        result
    }

    /// Dry-run: relay estimates plus a non-mutating cap/rate preview.
    /// Nothing is reserved or recorded.
    pub async fn simulate_bundle(
        &self,
        wallet_id: &str,
        recipe: &[BundleStep],
        exec: &ExecParams,
        base_amount_sol: f64,
    ) -> Result<BundleSimulation> {
        let report = self.api.simulate_bundle(wallet_id, recipe, exec).await?;

        let estimated = estimate_bundle_amount(recipe, base_amount_sol);
        let safety = self.caps.perform_safety_check(wallet_id, estimated).await;

        Ok(BundleSimulation { report, safety })
    }

    /// Caps registry, for status surfaces
    pub fn caps(&self) -> &Arc<CapsManager> {
        &self.caps
    }

    /// Signer registry
    pub fn portfolio(&self) -> &Arc<PortfolioSigner> {
        &self.portfolio
    }

    fn advance(&self, phase: &mut ExecutionPhase, next: ExecutionPhase, wallet_id: &str) {
        debug_assert!(
            phase.can_transition_to(next),
            "illegal phase transition {} -> {}",
            phase,
            next
        );
        debug!("Wallet {} execution phase: {} -> {}", wallet_id, phase, next);
        *phase = next;
    }

    async fn snapshot_journal(&self, wallet_id: &str) {
        if let Some(journal) = &self.journal {
            let records = self.caps.spend_records(wallet_id).await;
            if let Err(e) = journal.save_wallet(wallet_id, &records).await {
                warn!("Failed to persist spend journal for {}: {}", wallet_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::step::BuyAmount;
    use crate::bundle::testkit::{MockBundleApi, NoopPacer};
    use crate::signer::LocalKeypairSigner;
    use solana_sdk::signature::Keypair;
    use solana_sdk::signer::Signer;

    struct Harness {
        api: Arc<MockBundleApi>,
        integration: BundlerIntegration,
    }

    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    }

    async fn harness_with(config: Config, balance_sol: f64) -> Harness {
        init_test_logging();
        let api = Arc::new(MockBundleApi::new().with_txs_per_step(2));
        let integration =
            BundlerIntegration::new(config, api.clone()).with_pacer(Arc::new(NoopPacer));

        let keypair = Keypair::new();
        api.register_payer("w1", keypair.pubkey());
        integration
            .initialize(vec![(
                WalletInfo::new("w1", keypair.pubkey().to_string(), balance_sol),
                Arc::new(LocalKeypairSigner::new(keypair)) as Arc<dyn WalletSigner>,
            )])
            .await;

        Harness { api, integration }
    }

    async fn harness() -> Harness {
        let mut config = Config::default();
        config.executor.rate_limit_ms = 0;
        // Tests drive several executions back to back
        config.caps.cooldown_ms = 0;
        harness_with(config, 10.0).await
    }

    fn snipe(amount_sol: f64) -> SnipeRequest {
        SnipeRequest {
            wallet_id: "w1".into(),
            automation_id: "snipe-1".into(),
            route: "direct".into(),
            amount_sol,
            guard: GuardParams::default(),
            exec: ExecParams::default(),
        }
    }

    #[tokio::test]
    async fn test_initialize_seeds_caps_from_balance() {
        let h = harness().await;

        // balance 10 SOL → daily min(5.0, 5.0), per-bundle min(1.0, 1.0)
        let stats = h.integration.caps().daily_stats("w1").await.unwrap();
        assert_eq!(stats.daily_cap_sol, 5.0);
        assert_eq!(stats.per_bundle_cap_sol, 1.0);
        assert!(h.integration.portfolio().has_signer("w1"));
    }

    #[tokio::test]
    async fn test_initialize_caps_scale_with_small_balance() {
        let mut config = Config::default();
        config.executor.rate_limit_ms = 0;
        let h = harness_with(config, 4.0).await;

        // balance 4 SOL → daily 2.0, per-bundle 0.4
        let stats = h.integration.caps().daily_stats("w1").await.unwrap();
        assert_eq!(stats.daily_cap_sol, 2.0);
        assert!((stats.per_bundle_cap_sol - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_per_bundle_rejection_never_reaches_executor() {
        let h = harness().await;

        let result = h.integration.execute_snipe_as_bundle(snipe(1.5)).await;

        assert!(!result.success);
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("exceeds per-bundle cap"));
        assert_eq!(h.api.prepare_calls(), 0);
        assert_eq!(h.api.relay_calls(), 0);

        // Nothing was reserved
        let stats = h.integration.caps().daily_stats("w1").await.unwrap();
        assert_eq!(stats.daily_used_sol, 0.0);
        assert!(stats.records.is_empty());
    }

    #[tokio::test]
    async fn test_successful_snipe_commits_reservation() {
        let h = harness().await;

        let result = h.integration.execute_snipe_as_bundle(snipe(0.8)).await;

        assert!(result.success);
        assert_eq!(result.details.total_txs, 4);
        assert!(!result.bundle_ids.is_empty());

        let stats = h.integration.caps().daily_stats("w1").await.unwrap();
        assert!((stats.daily_used_sol - 0.8).abs() < f64::EPSILON);
        assert_eq!(stats.records.len(), 1);
        assert_eq!(
            stats.records[0].automation_id.as_deref(),
            Some("snipe-1")
        );
    }

    #[tokio::test]
    async fn test_copy_trade_estimates_pct_of_observed() {
        let h = harness().await;

        let req = CopyTradeRequest {
            wallet_id: "w1".into(),
            automation_id: "copy-7".into(),
            source_wallet: "whale".into(),
            program: "amm-program".into(),
            route: "amm".into(),
            observed_amount_sol: 2.0,
            pct_cap: 25.0,
            guard: GuardParams::default(),
            exec: ExecParams::default(),
        };
        let result = h.integration.execute_copy_as_bundle(req).await;

        assert!(result.success);
        let stats = h.integration.caps().daily_stats("w1").await.unwrap();
        assert!((stats.daily_used_sol - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.records[0].kind, SpendKind::CopyTrade);
    }

    #[tokio::test]
    async fn test_failed_execution_releases_reservation() {
        let h = harness().await;
        // Snipe recipe: 2 steps × 2 txs = 4 txs = one chunk; fail it
        h.api.fail_relay_call(0);

        let result = h.integration.execute_snipe_as_bundle(snipe(0.8)).await;

        assert!(!result.success);
        let stats = h.integration.caps().daily_stats("w1").await.unwrap();
        assert_eq!(stats.daily_used_sol, 0.0);
        assert!(stats.records.is_empty());
    }

    #[tokio::test]
    async fn test_failed_attempts_still_throttle() {
        let mut config = Config::default();
        config.executor.rate_limit_ms = 0;
        config.caps.cooldown_ms = 30000;
        let h = harness_with(config, 10.0).await;

        h.api.fail_relay_call(0);
        let result = h.integration.execute_snipe_as_bundle(snipe(0.8)).await;
        assert!(!result.success);

        // The failed attempt was recorded: cooldown now rejects
        let check = h.integration.caps().check_rate_limit("w1").await;
        assert!(!check.passed);
        assert!(check.errors[0].contains("Cooldown active"));
    }

    #[tokio::test]
    async fn test_cooldown_rejects_second_execution() {
        let mut config = Config::default();
        config.executor.rate_limit_ms = 0;
        config.caps.cooldown_ms = 30000;
        let h = harness_with(config, 10.0).await;

        let first = h.integration.execute_snipe_as_bundle(snipe(0.5)).await;
        assert!(first.success);

        let second = h.integration.execute_snipe_as_bundle(snipe(0.5)).await;
        assert!(!second.success);
        assert!(second.error.as_deref().unwrap().contains("Cooldown"));
        // Only the first execution reached the relay
        assert_eq!(h.api.prepare_calls(), 1);

        // The rejected attempt reserved nothing extra
        let stats = h.integration.caps().daily_stats("w1").await.unwrap();
        assert!((stats.daily_used_sol - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_bundler_automation_with_explicit_recipe() {
        let h = harness().await;

        let req = BundlerRequest {
            wallet_id: "w1".into(),
            automation_id: None,
            recipe: vec![
                BundleStep::Approve {
                    program: "prog".into(),
                },
                BundleStep::Buy {
                    route: "direct".into(),
                    amount: BuyAmount::Exact { amount_sol: 0.3 },
                },
                BundleStep::Sell {
                    route: "direct".into(),
                    amount_sol: 1.0,
                },
            ],
            base_amount_sol: 0.0,
            exec: ExecParams::default(),
        };
        let result = h.integration.execute_bundler_automation(req).await;

        assert!(result.success);
        // Only the buy spends against the cap
        let stats = h.integration.caps().daily_stats("w1").await.unwrap();
        assert!((stats.daily_used_sol - 0.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_simulate_is_non_mutating() {
        let h = harness().await;

        let recipe = snipe_recipe(&snipe(0.8));
        let simulation = h
            .integration
            .simulate_bundle("w1", &recipe, &ExecParams::default(), 0.0)
            .await
            .unwrap();

        assert!(simulation.safety.passed);
        assert_eq!(h.api.simulate_calls(), 1);
        assert_eq!(h.api.prepare_calls(), 0);

        let stats = h.integration.caps().daily_stats("w1").await.unwrap();
        assert_eq!(stats.daily_used_sol, 0.0);
        assert!(stats.records.is_empty());

        // Rate limit untouched: an execution right after still passes
        let check = h.integration.caps().check_rate_limit("w1").await;
        assert!(check.passed);
    }

    #[tokio::test]
    async fn test_simulate_surfaces_cap_violations() {
        let h = harness().await;

        let recipe = snipe_recipe(&snipe(1.5));
        let simulation = h
            .integration
            .simulate_bundle("w1", &recipe, &ExecParams::default(), 0.0)
            .await
            .unwrap();

        assert!(!simulation.safety.passed);
        assert!(simulation.safety.errors[0].contains("exceeds per-bundle cap"));
    }

    #[tokio::test]
    async fn test_safety_disabled_skips_caps_entirely() {
        let mut config = Config::default();
        config.executor.rate_limit_ms = 0;
        config.caps.safety_checks_enabled = false;
        let h = harness_with(config, 10.0).await;

        // 1.5 SOL would normally exceed the per-bundle cap
        let result = h.integration.execute_snipe_as_bundle(snipe(1.5)).await;
        assert!(result.success);

        let stats = h.integration.caps().daily_stats("w1").await.unwrap();
        assert_eq!(stats.daily_used_sol, 0.0);
    }

    #[tokio::test]
    async fn test_journal_snapshot_after_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.json");

        let mut config = Config::default();
        config.executor.rate_limit_ms = 0;
        config.caps.cooldown_ms = 0;
        config.journal_path = Some(path.to_string_lossy().into_owned());
        let h = harness_with(config, 10.0).await;

        let result = h.integration.execute_snipe_as_bundle(snipe(0.6)).await;
        assert!(result.success);

        let journal = SpendJournal::new(&path);
        let records = journal.load_wallet("w1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert!((records[0].amount_sol - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_phase_transitions() {
        use ExecutionPhase::*;

        assert!(Idle.can_transition_to(SafetyCheck));
        assert!(SafetyCheck.can_transition_to(Rejected));
        assert!(SafetyCheck.can_transition_to(Reserved));
        assert!(Reserved.can_transition_to(Executing));
        assert!(Executing.can_transition_to(Committed));
        assert!(Executing.can_transition_to(FailedReleased));
        // Safety disabled path skips straight to execution
        assert!(Idle.can_transition_to(Executing));

        assert!(!Rejected.can_transition_to(Executing));
        assert!(!Committed.can_transition_to(Executing));
        assert!(Rejected.is_terminal());
        assert!(Committed.is_terminal());
        assert!(FailedReleased.is_terminal());
        assert!(!Reserved.is_terminal());
    }
}
