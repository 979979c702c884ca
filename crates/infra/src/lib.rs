//! Infrastructure layer: persistence port, row locks, audit sink, clock, config.

pub mod audit;
pub mod clock;
pub mod config;
pub mod locks;
pub mod store;

pub use audit::{AuditEntry, AuditError, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use locks::{LockError, LockGuard, LockKey, LockManager};
pub use store::{InMemoryLedgerStore, LedgerStore, ReversalWrite, StoreError};
