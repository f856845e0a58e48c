//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub caps: CapsConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    /// Optional path for the JSON spend journal. No journal when unset.
    #[serde(default)]
    pub journal_path: Option<String>,
}

/// Bundle executor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum transactions per relayed chunk
    #[serde(default = "default_max_txs_per_bundle")]
    pub max_txs_per_bundle: usize,
    /// Pause between chunk submissions
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
    /// Maximum steps accepted in one recipe
    #[serde(default = "default_max_recipe_steps")]
    pub max_recipe_steps: usize,
    /// Per-signature base fee charged by the chain
    #[serde(default = "default_base_fee_lamports")]
    pub base_fee_lamports: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_txs_per_bundle: default_max_txs_per_bundle(),
            rate_limit_ms: default_rate_limit_ms(),
            max_recipe_steps: default_max_recipe_steps(),
            base_fee_lamports: default_base_fee_lamports(),
        }
    }
}

/// Spending cap and rate limit configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CapsConfig {
    /// Fraction of wallet balance used as the daily cap
    #[serde(default = "default_daily_cap_balance_pct")]
    pub daily_cap_balance_pct: f64,
    /// Hard ceiling on the daily cap in SOL
    #[serde(default = "default_daily_cap_max_sol")]
    pub daily_cap_max_sol: f64,
    /// Fraction of wallet balance used as the per-bundle cap
    #[serde(default = "default_per_bundle_balance_pct")]
    pub per_bundle_balance_pct: f64,
    /// Hard ceiling on the per-bundle cap in SOL
    #[serde(default = "default_per_bundle_cap_max_sol")]
    pub per_bundle_cap_max_sol: f64,
    /// Minimum time between executions per wallet
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Sliding-window execution ceiling per wallet
    #[serde(default = "default_max_executions_per_minute")]
    pub max_executions_per_minute: usize,
    /// Disable to bypass cap/rate checks entirely (manual operation only)
    #[serde(default = "default_true")]
    pub safety_checks_enabled: bool,
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self {
            daily_cap_balance_pct: default_daily_cap_balance_pct(),
            daily_cap_max_sol: default_daily_cap_max_sol(),
            per_bundle_balance_pct: default_per_bundle_balance_pct(),
            per_bundle_cap_max_sol: default_per_bundle_cap_max_sol(),
            cooldown_ms: default_cooldown_ms(),
            max_executions_per_minute: default_max_executions_per_minute(),
            safety_checks_enabled: true,
        }
    }
}

/// Relay submission configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_min_tip")]
    pub min_tip_lamports: u64,
    #[serde(default = "default_max_tip")]
    pub max_tip_lamports: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            min_tip_lamports: default_min_tip(),
            max_tip_lamports: default_max_tip(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl RelayConfig {
    /// Clamp a tip to the configured bounds
    pub fn clamp_tip(&self, tip: u64) -> u64 {
        tip.clamp(self.min_tip_lamports, self.max_tip_lamports)
    }
}

// Default value functions

fn default_max_txs_per_bundle() -> usize {
    5
}

fn default_rate_limit_ms() -> u64 {
    500
}

fn default_max_recipe_steps() -> usize {
    20
}

fn default_base_fee_lamports() -> u64 {
    5000
}

fn default_daily_cap_balance_pct() -> f64 {
    0.5
}

fn default_daily_cap_max_sol() -> f64 {
    5.0
}

fn default_per_bundle_balance_pct() -> f64 {
    0.1
}

fn default_per_bundle_cap_max_sol() -> f64 {
    1.0
}

fn default_cooldown_ms() -> u64 {
    30000
}

fn default_max_executions_per_minute() -> usize {
    10
}

fn default_min_tip() -> u64 {
    10000
}

fn default_max_tip() -> u64 {
    1000000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Pull in .env before reading the environment source
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix BUNDLE_PILOT_)
            .add_source(
                config::Environment::with_prefix("BUNDLE_PILOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.executor.max_txs_per_bundle == 0 {
            anyhow::bail!("executor.max_txs_per_bundle must be at least 1");
        }

        // Jito-style block engines reject bundles above 5 transactions
        if self.executor.max_txs_per_bundle > 5 {
            anyhow::bail!(
                "executor.max_txs_per_bundle cannot exceed 5, got {}",
                self.executor.max_txs_per_bundle
            );
        }

        if self.executor.max_recipe_steps == 0 {
            anyhow::bail!("executor.max_recipe_steps must be at least 1");
        }

        if !(0.0..=1.0).contains(&self.caps.daily_cap_balance_pct) {
            anyhow::bail!(
                "caps.daily_cap_balance_pct must be within [0, 1], got {}",
                self.caps.daily_cap_balance_pct
            );
        }

        if !(0.0..=1.0).contains(&self.caps.per_bundle_balance_pct) {
            anyhow::bail!(
                "caps.per_bundle_balance_pct must be within [0, 1], got {}",
                self.caps.per_bundle_balance_pct
            );
        }

        if self.caps.max_executions_per_minute == 0 {
            anyhow::bail!("caps.max_executions_per_minute must be at least 1");
        }

        if self.relay.min_tip_lamports > self.relay.max_tip_lamports {
            anyhow::bail!(
                "relay.min_tip_lamports {} exceeds relay.max_tip_lamports {}",
                self.relay.min_tip_lamports,
                self.relay.max_tip_lamports
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.executor.max_txs_per_bundle, 5);
        assert_eq!(config.executor.rate_limit_ms, 500);
        assert_eq!(config.executor.max_recipe_steps, 20);
        assert_eq!(config.caps.cooldown_ms, 30000);
        assert_eq!(config.caps.max_executions_per_minute, 10);
        assert!(config.caps.safety_checks_enabled);
        assert!(config.journal_path.is_none());
    }

    #[test]
    fn test_validate_rejects_oversized_chunks() {
        let mut config = Config::default();
        config.executor.max_txs_per_bundle = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_tip_bounds() {
        let mut config = Config::default();
        config.relay.min_tip_lamports = 2_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tip_clamping() {
        let relay = RelayConfig::default();
        assert_eq!(relay.clamp_tip(5000), 10000); // Below min
        assert_eq!(relay.clamp_tip(50000), 50000); // In range
        assert_eq!(relay.clamp_tip(2000000), 1000000); // Above max
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("does-not-exist.toml").unwrap();
        assert_eq!(config.executor.max_txs_per_bundle, 5);
    }
}
