//! Bundle pipeline - recipe steps, relay API seam, and the executor
//!
//! The executor turns a recipe into prepared transactions, signs them in
//! bounded chunks, and relays each chunk sequentially with pacing in
//! between. Relay and preparation live behind the `BundleApi` trait.

pub mod api;
pub mod executor;
pub mod pacer;
pub mod step;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use api::{BundleApi, PreparedBundle, RelayResult, SimulationReport};
pub use executor::{BundleExecutionResult, BundleExecutor, ExecuteBundleOptions, ExecutionDetails};
pub use pacer::{ChunkPacer, NoopPacer, SleepPacer};
pub use step::{estimate_bundle_amount, BundleStep, BuyAmount, ExecParams};
