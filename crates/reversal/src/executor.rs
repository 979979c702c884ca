//! Committing reversals.
//!
//! Each allocation is its own unit of work: lock the payment and invoice it
//! references, re-read under the lock, then persist the three row changes
//! atomically. A failing item is recorded and the loop moves on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use payrev_core::{TenantId, UserId};
use payrev_infra::{
    AuditEntry, AuditSink, Clock, EngineConfig, LedgerStore, LockKey, ReversalWrite, StoreError,
};
use payrev_ledger::AllocationId;

use crate::error::{ItemFailure, ReversalError};
use crate::report::{ItemResult, ReversalResult};
use crate::validation::validate_reason;

/// Cooperative cancellation, checked between allocations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct ReversalExecutor<S, A, C> {
    store: S,
    audit: A,
    clock: C,
    config: EngineConfig,
}

impl<S, A, C> ReversalExecutor<S, A, C>
where
    S: LedgerStore,
    A: AuditSink,
    C: Clock,
{
    /// Row locks come from `store`, so executors over the same storage
    /// serialize on shared payments and invoices.
    pub fn new(store: S, audit: A, clock: C, config: EngineConfig) -> Self {
        Self {
            store,
            audit,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Reverse `allocation_ids` in the order given.
    ///
    /// Only an invalid reason, an empty request, or a request in which no id
    /// exists fails the call. Per-allocation failures are itemised in the
    /// result.
    pub fn reverse(
        &self,
        tenant_id: TenantId,
        allocation_ids: &[AllocationId],
        reason: &str,
        actor: UserId,
    ) -> Result<ReversalResult, ReversalError> {
        self.reverse_cancellable(tenant_id, allocation_ids, reason, actor, &CancelToken::new())
    }

    /// As [`reverse`](Self::reverse), stopping before the next allocation once
    /// `cancel` fires. Committed reversals stand; the rest are listed as
    /// unprocessed.
    pub fn reverse_cancellable(
        &self,
        tenant_id: TenantId,
        allocation_ids: &[AllocationId],
        reason: &str,
        actor: UserId,
        cancel: &CancelToken,
    ) -> Result<ReversalResult, ReversalError> {
        validate_reason(reason, self.config.reason_limit())?;
        if allocation_ids.is_empty() {
            return Err(ReversalError::NoAllocationsFound);
        }

        let mut any_exists = false;
        for &id in allocation_ids {
            if self.store.allocation(tenant_id, id)?.is_some() {
                any_exists = true;
                break;
            }
        }
        if !any_exists {
            return Err(ReversalError::NoAllocationsFound);
        }

        tracing::info!(
            tenant_id = %tenant_id,
            actor = %actor,
            requested = allocation_ids.len(),
            "reversing allocations"
        );

        let mut results = Vec::with_capacity(allocation_ids.len());
        let mut unprocessed = Vec::new();
        for (index, &allocation_id) in allocation_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                unprocessed.extend_from_slice(&allocation_ids[index..]);
                tracing::warn!(
                    tenant_id = %tenant_id,
                    unprocessed = unprocessed.len(),
                    "reversal cancelled"
                );
                break;
            }

            let item = match self.reverse_one(tenant_id, allocation_id, reason, actor) {
                Ok(item) => item,
                Err(failure) => {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        allocation_id = %allocation_id,
                        error = %failure,
                        "allocation reversal failed"
                    );
                    ItemResult::error(allocation_id, failure.to_string())
                }
            };
            results.push(item);
        }

        let result = ReversalResult::from_items(results, unprocessed);
        tracing::info!(
            tenant_id = %tenant_id,
            total_processed = result.total_processed,
            reversed = result.reversed_count,
            already_reversed = result.already_reversed_count,
            errors = result.error_count,
            cancelled = result.cancelled,
            "reversal finished"
        );
        Ok(result)
    }

    fn reverse_one(
        &self,
        tenant_id: TenantId,
        allocation_id: AllocationId,
        reason: &str,
        actor: UserId,
    ) -> Result<ItemResult, ItemFailure> {
        let peek = self
            .store
            .allocation(tenant_id, allocation_id)?
            .ok_or(ItemFailure::AllocationMissing)?;
        // Reversed is terminal; no lock needed to report it.
        if !peek.is_active() {
            return Ok(ItemResult::already_reversed(allocation_id));
        }

        let _guard = self.store.row_locks().acquire_within(
            tenant_id,
            [
                LockKey::Payment(peek.payment_id()),
                LockKey::Invoice(peek.invoice_id()),
            ],
            self.config.lock_timeout(),
        )?;

        let allocation = self
            .store
            .allocation(tenant_id, allocation_id)?
            .ok_or(ItemFailure::AllocationMissing)?;
        if !allocation.is_active() {
            return Ok(ItemResult::already_reversed(allocation_id));
        }
        let payment = self
            .store
            .payment(tenant_id, allocation.payment_id())?
            .ok_or_else(|| {
                ItemFailure::RecordMissing(format!("payment {}", allocation.payment_id()))
            })?;
        let invoice = self
            .store
            .invoice(tenant_id, allocation.invoice_id())?
            .ok_or_else(|| {
                ItemFailure::RecordMissing(format!("invoice {}", allocation.invoice_id()))
            })?;

        let amount = allocation.allocated_amount();
        let reversed_at = self.clock.now();

        let mut next_invoice = invoice.clone();
        next_invoice.release_allocation(amount)?;
        let mut next_payment = payment.clone();
        next_payment.release_allocation(amount)?;
        let mut next_allocation = allocation.clone();
        next_allocation.reverse(reversed_at, reason, actor)?;

        let write = ReversalWrite::new(
            (&allocation, &payment, &invoice),
            next_allocation,
            next_payment,
            next_invoice,
        );
        match self.store.commit_reversal(tenant_id, &write) {
            Ok(()) => {}
            // A writer outside the row locks got there first.
            Err(StoreError::Concurrency(detail)) => {
                let current = self.store.allocation(tenant_id, allocation_id)?;
                if current.is_some_and(|a| !a.is_active()) {
                    return Ok(ItemResult::already_reversed(allocation_id));
                }
                return Err(StoreError::Concurrency(detail).into());
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            tenant_id = %tenant_id,
            allocation_id = %allocation_id,
            amount = %amount,
            invoice_status = %write.invoice.status(),
            "allocation reversed"
        );

        let entry = AuditEntry::allocation_reversed(
            tenant_id,
            actor,
            allocation_id,
            allocation.payment_id(),
            allocation.invoice_id(),
            amount,
            reason,
            reversed_at,
        );
        if let Err(err) = self.audit.record(entry) {
            tracing::warn!(
                tenant_id = %tenant_id,
                allocation_id = %allocation_id,
                error = %err,
                "audit write failed; reversal stands"
            );
        }

        Ok(ItemResult::reversed(allocation_id, amount))
    }
}
