//! # Worker Liveness
//!
//! Liveness and load tracking for scan workers on top of an expiring
//! key/value store.
//!
//! ```text
//! HeartbeatPublisher (worker) ──publish──▶ WorkerLoadTracker ◀──read── WorkerSelectionService
//!                                                │
//!                                        LivenessProvider (+ circuit breaker)
//!                                                │
//!                              Redis | InMemory | NoOp  (LivenessStore)
//! ```

pub mod heartbeat;
pub mod provider;
pub mod providers;
pub mod tracker;
pub mod traits;

pub use heartbeat::{HeartbeatPublisher, LoadSample, LoadSampler, SystemLoadSampler};
pub use provider::LivenessProvider;
pub use providers::{InMemoryLivenessStore, NoOpLivenessStore, RedisLivenessStore};
pub use tracker::{worker_load_key, WorkerId, WorkerLoadRecord, WorkerLoadTracker};
pub use traits::{FieldMap, LivenessStore};
