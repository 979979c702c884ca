//! Fine-grained row locks for payments and invoices.
//!
//! A reversal locks the payment and the invoice its allocation references.
//! Keys are always acquired in ascending order, so two callers touching
//! overlapping rows can never wait on each other in a cycle. Waits are
//! bounded by the manager's timeout.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use payrev_core::TenantId;
use payrev_ledger::{InvoiceId, PaymentId};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// A lockable row. Ordering: every payment key sorts before every invoice key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Payment(PaymentId),
    Invoice(InvoiceId),
}

impl core::fmt::Display for LockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LockKey::Payment(id) => write!(f, "payment {id}"),
            LockKey::Invoice(id) => write!(f, "invoice {id}"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("timed out after {waited_ms}ms waiting for lock on {key}")]
    Timeout { key: String, waited_ms: u128 },

    #[error("lock table poisoned")]
    Poisoned,
}

/// Lock table owned by the storage, so every caller over the same store
/// contends on the same rows.
#[derive(Debug)]
pub struct LockManager {
    held: Mutex<HashSet<(TenantId, LockKey)>>,
    released: Condvar,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire all `keys` (deduplicated, ascending order) or none of them.
    pub fn acquire<I>(&self, tenant_id: TenantId, keys: I) -> Result<LockGuard<'_>, LockError>
    where
        I: IntoIterator<Item = LockKey>,
    {
        self.acquire_within(tenant_id, keys, self.timeout)
    }

    /// As [`acquire`](Self::acquire), waiting at most `timeout`.
    pub fn acquire_within<I>(
        &self,
        tenant_id: TenantId,
        keys: I,
        timeout: Duration,
    ) -> Result<LockGuard<'_>, LockError>
    where
        I: IntoIterator<Item = LockKey>,
    {
        let mut wanted: Vec<(TenantId, LockKey)> =
            keys.into_iter().map(|k| (tenant_id, k)).collect();
        wanted.sort();
        wanted.dedup();

        let started = Instant::now();
        let deadline = started + timeout;
        let mut held = self.held.lock().map_err(|_| LockError::Poisoned)?;
        let mut acquired: Vec<(TenantId, LockKey)> = Vec::with_capacity(wanted.len());

        for key in wanted {
            while held.contains(&key) {
                let now = Instant::now();
                if now >= deadline {
                    for k in &acquired {
                        held.remove(k);
                    }
                    drop(held);
                    self.released.notify_all();
                    return Err(LockError::Timeout {
                        key: key.1.to_string(),
                        waited_ms: started.elapsed().as_millis(),
                    });
                }
                held = match self.released.wait_timeout(held, deadline - now) {
                    Ok((guard, _)) => guard,
                    Err(poisoned) => {
                        let (mut guard, _) = poisoned.into_inner();
                        for k in &acquired {
                            guard.remove(k);
                        }
                        drop(guard);
                        self.released.notify_all();
                        return Err(LockError::Poisoned);
                    }
                };
            }
            held.insert(key);
            acquired.push(key);
        }

        tracing::debug!(
            tenant_id = %tenant_id,
            keys = acquired.len(),
            waited_ms = started.elapsed().as_millis() as u64,
            "row locks acquired"
        );

        Ok(LockGuard {
            manager: self,
            keys: acquired,
        })
    }

    fn release(&self, keys: &[(TenantId, LockKey)]) {
        // A poisoned table still needs its keys removed or waiters starve.
        let mut held = match self.held.lock() {
            Ok(h) => h,
            Err(poisoned) => poisoned.into_inner(),
        };
        for k in keys {
            held.remove(k);
        }
        drop(held);
        self.released.notify_all();
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

/// Releases its keys when dropped.
#[derive(Debug)]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    keys: Vec<(TenantId, LockKey)>,
}

impl LockGuard<'_> {
    pub fn keys(&self) -> impl Iterator<Item = LockKey> + '_ {
        self.keys.iter().map(|(_, k)| *k)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(&self.keys);
    }
}
