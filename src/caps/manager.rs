//! Caps manager - spending cap and rate limit enforcement
//!
//! Enforces hard limits on automation spending. Checks never return an
//! error type; they produce a `SafetyCheck` so callers branch on warnings
//! versus hard errors. All mutations for one wallet serialize on that
//! wallet's mutex, so concurrent reservations cannot lose updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::CapsConfig;

use super::rate_limit::RateLimit;
use super::spending::{SpendKind, SpendRecord, SpendingCap};

/// Warn when a spend would push daily usage past this fraction of the cap
const DAILY_WARN_RATIO: f64 = 0.8;

/// Warn when a single bundle uses more than this fraction of its cap
const PER_BUNDLE_WARN_RATIO: f64 = 0.9;

/// Warn when the execution window is past this fraction of its ceiling
const RATE_WARN_RATIO: f64 = 0.8;

/// Outcome of a cap or rate check
#[derive(Debug, Clone, Default)]
pub struct SafetyCheck {
    pub passed: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub recommendations: Vec<String>,
}

impl SafetyCheck {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            passed: false,
            errors: vec![error.into()],
            ..Default::default()
        }
    }

    /// Fold another check into this one; passes only if both passed
    pub fn merge(&mut self, other: SafetyCheck) {
        self.passed = self.passed && other.passed;
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
        self.recommendations.extend(other.recommendations);
    }
}

/// Combined limit state for one wallet
#[derive(Debug)]
struct WalletLimits {
    spending: SpendingCap,
    rate: RateLimit,
}

/// Per-wallet spending cap and rate limit registry.
///
/// In-memory and single-process: coordinating multiple processes requires
/// an external keyed store behind this same interface.
pub struct CapsManager {
    config: CapsConfig,
    wallets: DashMap<String, Arc<Mutex<WalletLimits>>>,
}

impl CapsManager {
    pub fn new(config: CapsConfig) -> Self {
        Self {
            config,
            wallets: DashMap::new(),
        }
    }

    /// Create cap and rate-limit state for a wallet.
    ///
    /// Re-initializing an existing wallet updates the cap limits but keeps
    /// accumulated usage and the execution window intact.
    pub async fn initialize_wallet_cap(
        &self,
        wallet_id: &str,
        daily_cap_sol: f64,
        per_bundle_cap_sol: f64,
    ) {
        if let Some(existing) = self.limits(wallet_id) {
            let mut limits = existing.lock().await;
            limits.spending.daily_cap_sol = daily_cap_sol;
            limits.spending.per_bundle_cap_sol = per_bundle_cap_sol;
            info!(
                "Updated caps for wallet {}: daily {} SOL, per-bundle {} SOL",
                wallet_id, daily_cap_sol, per_bundle_cap_sol
            );
            return;
        }

        let limits = WalletLimits {
            spending: SpendingCap::new(wallet_id, daily_cap_sol, per_bundle_cap_sol, Utc::now()),
            rate: RateLimit::new(
                wallet_id,
                self.config.cooldown_ms,
                self.config.max_executions_per_minute,
            ),
        };
        self.wallets
            .insert(wallet_id.to_string(), Arc::new(Mutex::new(limits)));

        info!(
            "Initialized caps for wallet {}: daily {} SOL, per-bundle {} SOL",
            wallet_id, daily_cap_sol, per_bundle_cap_sol
        );
    }

    /// Check whether a wallet has cap state
    pub fn is_initialized(&self, wallet_id: &str) -> bool {
        self.wallets.contains_key(wallet_id)
    }

    /// Check a prospective spend against the wallet's caps
    pub async fn check_spending_cap(&self, wallet_id: &str, amount_sol: f64) -> SafetyCheck {
        self.check_spending_cap_at(wallet_id, amount_sol, Utc::now())
            .await
    }

    async fn check_spending_cap_at(
        &self,
        wallet_id: &str,
        amount_sol: f64,
        now: DateTime<Utc>,
    ) -> SafetyCheck {
        let Some(entry) = self.limits(wallet_id) else {
            return Self::uninitialized(wallet_id);
        };
        let mut limits = entry.lock().await;
        Self::evaluate_spending(&mut limits, amount_sol, now)
    }

    /// Atomically re-check and reserve a spend. Returns false when the
    /// check fails (including a race that filled the cap since an earlier
    /// check).
    pub async fn reserve_spending(
        &self,
        wallet_id: &str,
        amount_sol: f64,
        kind: SpendKind,
        automation_id: Option<String>,
    ) -> bool {
        self.reserve_spending_at(wallet_id, amount_sol, kind, automation_id, Utc::now())
            .await
    }

    async fn reserve_spending_at(
        &self,
        wallet_id: &str,
        amount_sol: f64,
        kind: SpendKind,
        automation_id: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(entry) = self.limits(wallet_id) else {
            warn!("Reservation refused: wallet {} not initialized", wallet_id);
            return false;
        };
        let mut limits = entry.lock().await;

        let check = Self::evaluate_spending(&mut limits, amount_sol, now);
        if !check.passed {
            warn!(
                "Reservation refused for wallet {}: {}",
                wallet_id,
                check.errors.join("; ")
            );
            return false;
        }

        limits
            .spending
            .record_spend(amount_sol, kind, automation_id, now);
        debug!(
            "Reserved {} SOL for wallet {} (daily used: {} SOL)",
            amount_sol, wallet_id, limits.spending.daily_used_sol
        );
        true
    }

    /// Compensating release for a failed execution
    pub async fn release_spending(&self, wallet_id: &str, amount_sol: f64) {
        let Some(entry) = self.limits(wallet_id) else {
            return;
        };
        let mut limits = entry.lock().await;
        limits.spending.release(amount_sol);
        debug!(
            "Released {} SOL for wallet {} (daily used: {} SOL)",
            amount_sol, wallet_id, limits.spending.daily_used_sol
        );
    }

    /// Check the wallet's cooldown and sliding execution window
    pub async fn check_rate_limit(&self, wallet_id: &str) -> SafetyCheck {
        self.check_rate_limit_at(wallet_id, Utc::now()).await
    }

    async fn check_rate_limit_at(&self, wallet_id: &str, now: DateTime<Utc>) -> SafetyCheck {
        let Some(entry) = self.limits(wallet_id) else {
            return Self::uninitialized(wallet_id);
        };
        let mut limits = entry.lock().await;
        Self::evaluate_rate(&mut limits, now)
    }

    /// Record an execution attempt. Called for every attempt regardless of
    /// outcome, so repeated failures still throttle.
    pub async fn record_execution(&self, wallet_id: &str) {
        self.record_execution_at(wallet_id, Utc::now()).await;
    }

    async fn record_execution_at(&self, wallet_id: &str, now: DateTime<Utc>) {
        let Some(entry) = self.limits(wallet_id) else {
            return;
        };
        let mut limits = entry.lock().await;
        limits.rate.record_execution(now);
    }

    /// Conjunction of the spending and rate checks, evaluated under one
    /// wallet lock
    pub async fn perform_safety_check(&self, wallet_id: &str, amount_sol: f64) -> SafetyCheck {
        self.perform_safety_check_at(wallet_id, amount_sol, Utc::now())
            .await
    }

    async fn perform_safety_check_at(
        &self,
        wallet_id: &str,
        amount_sol: f64,
        now: DateTime<Utc>,
    ) -> SafetyCheck {
        let Some(entry) = self.limits(wallet_id) else {
            return Self::uninitialized(wallet_id);
        };
        let mut limits = entry.lock().await;

        let mut check = Self::evaluate_spending(&mut limits, amount_sol, now);
        check.merge(Self::evaluate_rate(&mut limits, now));
        check
    }

    /// Unspent daily allowance, None when the wallet is unknown
    pub async fn remaining_daily_allowance(&self, wallet_id: &str) -> Option<f64> {
        let entry = self.limits(wallet_id)?;
        let mut limits = entry.lock().await;
        limits.spending.reset_if_new_day(Utc::now());
        Some(limits.spending.remaining_daily())
    }

    /// Snapshot of the wallet's spending state
    pub async fn daily_stats(&self, wallet_id: &str) -> Option<SpendingCap> {
        let entry = self.limits(wallet_id)?;
        let mut limits = entry.lock().await;
        limits.spending.reset_if_new_day(Utc::now());
        Some(limits.spending.clone())
    }

    /// Copy of the wallet's reservation records, oldest first
    pub async fn spend_records(&self, wallet_id: &str) -> Vec<SpendRecord> {
        match self.limits(wallet_id) {
            Some(entry) => entry.lock().await.spending.records.clone(),
            None => Vec::new(),
        }
    }

    fn limits(&self, wallet_id: &str) -> Option<Arc<Mutex<WalletLimits>>> {
        self.wallets.get(wallet_id).map(|e| e.value().clone())
    }

    fn uninitialized(wallet_id: &str) -> SafetyCheck {
        SafetyCheck::fail(format!("Wallet cap not initialized: {}", wallet_id))
    }

    fn evaluate_spending(
        limits: &mut WalletLimits,
        amount_sol: f64,
        now: DateTime<Utc>,
    ) -> SafetyCheck {
        limits.spending.reset_if_new_day(now);
        let cap = &limits.spending;

        let mut check = SafetyCheck::pass();

        if cap.exceeds_per_bundle(amount_sol) {
            check.passed = false;
            check.errors.push(format!(
                "Bundle amount {:.4} SOL exceeds per-bundle cap {:.4} SOL",
                amount_sol, cap.per_bundle_cap_sol
            ));
        } else if cap.per_bundle_utilization(amount_sol) > PER_BUNDLE_WARN_RATIO {
            check.warnings.push(format!(
                "Bundle amount {:.4} SOL is {:.0}% of the per-bundle cap",
                amount_sol,
                cap.per_bundle_utilization(amount_sol) * 100.0
            ));
        }

        if cap.would_exceed_daily(amount_sol) {
            check.passed = false;
            check.errors.push(format!(
                "Daily cap exceeded: {:.4} SOL used + {:.4} SOL requested > {:.4} SOL cap",
                cap.daily_used_sol, amount_sol, cap.daily_cap_sol
            ));
        } else if cap.daily_utilization_after(amount_sol) > DAILY_WARN_RATIO {
            check.warnings.push(format!(
                "Daily spending would reach {:.0}% of the {:.4} SOL cap",
                cap.daily_utilization_after(amount_sol) * 100.0,
                cap.daily_cap_sol
            ));
            check
                .recommendations
                .push("Reduce automation size or wait for the daily reset".to_string());
        }

        check
    }

    fn evaluate_rate(limits: &mut WalletLimits, now: DateTime<Utc>) -> SafetyCheck {
        let mut check = SafetyCheck::pass();

        if let Some(remaining_ms) = limits.rate.remaining_cooldown_ms(now) {
            check.passed = false;
            check.errors.push(format!(
                "Cooldown active: {:.1}s remaining",
                remaining_ms as f64 / 1000.0
            ));
        }

        let used = limits.rate.executions_last_minute(now);
        let max = limits.rate.max_executions_per_minute;
        if used >= max {
            check.passed = false;
            check.errors.push(format!(
                "Rate limit reached: {} executions in the last 60s (max {})",
                used, max
            ));
        } else if (used as f64) >= (max as f64) * RATE_WARN_RATIO {
            check.warnings.push(format!(
                "Approaching rate limit: {}/{} executions in the last 60s",
                used, max
            ));
            check
                .recommendations
                .push("Space out automation triggers".to_string());
        }

        check
    }
}
