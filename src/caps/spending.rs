//! Per-wallet spending cap accounting
//!
//! Tracks daily and per-bundle spend limits with a lazy UTC-day reset:
//! every access compares `last_reset` against the current UTC-midnight
//! boundary instead of relying on a background timer.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of automation produced a spend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendKind {
    CopyTrade,
    Snipe,
    Bundler,
    Manual,
}

impl std::fmt::Display for SpendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpendKind::CopyTrade => write!(f, "copy_trade"),
            SpendKind::Snipe => write!(f, "snipe"),
            SpendKind::Bundler => write!(f, "bundler"),
            SpendKind::Manual => write!(f, "manual"),
        }
    }
}

/// One reserved spend against a wallet's caps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendRecord {
    /// Unique record ID
    pub id: String,

    /// When the reservation was made
    pub timestamp: DateTime<Utc>,

    /// Reserved amount in SOL
    pub amount_sol: f64,

    /// Automation kind that reserved it
    pub kind: SpendKind,

    /// Automation that triggered the spend, if any
    pub automation_id: Option<String>,
}

/// Spending cap state for one wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingCap {
    pub wallet_id: String,
    pub daily_cap_sol: f64,
    pub daily_used_sol: f64,
    pub per_bundle_cap_sol: f64,
    /// UTC-midnight boundary of the accounting day currently in use
    pub last_reset: DateTime<Utc>,
    /// Reservation audit trail, oldest first
    pub records: Vec<SpendRecord>,
}

/// UTC midnight for the day containing `now`
pub(crate) fn utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

impl SpendingCap {
    pub fn new(
        wallet_id: impl Into<String>,
        daily_cap_sol: f64,
        per_bundle_cap_sol: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            daily_cap_sol,
            daily_used_sol: 0.0,
            per_bundle_cap_sol,
            last_reset: utc_midnight(now),
            records: Vec::new(),
        }
    }

    /// Reset daily usage if the UTC day rolled over since `last_reset`.
    /// Idempotent within one day; returns true when a reset happened.
    pub fn reset_if_new_day(&mut self, now: DateTime<Utc>) -> bool {
        let boundary = utc_midnight(now);
        if boundary > self.last_reset {
            self.daily_used_sol = 0.0;
            self.last_reset = boundary;
            true
        } else {
            false
        }
    }

    /// Would spending `amount` break the daily cap?
    pub fn would_exceed_daily(&self, amount: f64) -> bool {
        self.daily_used_sol + amount > self.daily_cap_sol
    }

    /// Does `amount` alone break the per-bundle cap?
    pub fn exceeds_per_bundle(&self, amount: f64) -> bool {
        amount > self.per_bundle_cap_sol
    }

    /// Daily usage after a hypothetical spend, as a fraction of the cap
    pub fn daily_utilization_after(&self, amount: f64) -> f64 {
        if self.daily_cap_sol <= 0.0 {
            return 1.0;
        }
        (self.daily_used_sol + amount) / self.daily_cap_sol
    }

    /// `amount` as a fraction of the per-bundle cap
    pub fn per_bundle_utilization(&self, amount: f64) -> f64 {
        if self.per_bundle_cap_sol <= 0.0 {
            return 1.0;
        }
        amount / self.per_bundle_cap_sol
    }

    /// Record a reserved spend. Caller must have passed the cap checks.
    pub fn record_spend(
        &mut self,
        amount: f64,
        kind: SpendKind,
        automation_id: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.daily_used_sol += amount;
        self.records.push(SpendRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            amount_sol: amount,
            kind,
            automation_id,
        });
    }

    /// Compensating release: decrement usage (floor 0) and remove the most
    /// recent record with a matching amount.
    pub fn release(&mut self, amount: f64) {
        self.daily_used_sol = (self.daily_used_sol - amount).max(0.0);

        if let Some(idx) = self
            .records
            .iter()
            .rposition(|r| (r.amount_sol - amount).abs() < f64::EPSILON)
        {
            self.records.remove(idx);
        }
    }

    /// Unspent daily allowance in SOL
    pub fn remaining_daily(&self) -> f64 {
        (self.daily_cap_sol - self.daily_used_sol).max(0.0)
    }
}
