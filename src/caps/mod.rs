//! Spending caps and execution rate limits
//!
//! Pure accounting, no I/O. Per-wallet state is created once via
//! `CapsManager::initialize_wallet_cap` and lives for the process lifetime.
//! Single-process only: the registries are in-memory and are NOT safe
//! across multiple processes without an external coordinating store.

pub mod journal;
pub mod manager;
pub mod rate_limit;
pub mod spending;

pub use journal::SpendJournal;
pub use manager::{CapsManager, SafetyCheck};
pub use rate_limit::RateLimit;
pub use spending::{SpendKind, SpendRecord, SpendingCap};
