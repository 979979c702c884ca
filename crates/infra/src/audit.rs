//! Append-only audit trail for reversals.
//!
//! The engine treats the sink as fire-and-forget: a failed write is logged
//! and never rolls back the reversal it describes.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use payrev_core::{Money, TenantId, UserId};
use payrev_ledger::{AllocationId, InvoiceId, PaymentId};

pub const ALLOCATION_REVERSED: &str = "allocation_reversed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: Uuid,
    pub tenant_id: TenantId,
    pub actor: UserId,
    pub action: String,
    pub allocation_id: AllocationId,
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn allocation_reversed(
        tenant_id: TenantId,
        actor: UserId,
        allocation_id: AllocationId,
        payment_id: PaymentId,
        invoice_id: InvoiceId,
        amount: Money,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: Uuid::now_v7(),
            tenant_id,
            actor,
            action: ALLOCATION_REVERSED.to_string(),
            allocation_id,
            payment_id,
            invoice_id,
            amount,
            reason: reason.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("failed to encode audit entry: {0}")]
    Encode(String),
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        (**self).record(entry)
    }
}

/// Emits each entry as a JSON-encoded `tracing` event on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let encoded = serde_json::to_string(&entry).map_err(|e| AuditError::Encode(e.to_string()))?;
        tracing::info!(
            target: "audit",
            action = %entry.action,
            tenant_id = %entry.tenant_id,
            allocation_id = %entry.allocation_id,
            entry = %encoded,
            "audit entry recorded"
        );
        Ok(())
    }
}

/// Keeps entries in memory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.read() {
            Ok(entries) => entries.clone(),
            Err(_) => vec![],
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .write()
            .map_err(|_| AuditError::Unavailable("lock poisoned".to_string()))?
            .push(entry);
        Ok(())
    }
}
