//! Concrete liveness store backends

pub mod memory;
pub mod noop;
pub mod redis;

pub use memory::InMemoryLivenessStore;
pub use noop::NoOpLivenessStore;
pub use self::redis::RedisLivenessStore;
