//! Facade over the analyzer and executor for orchestrating callers.

use std::sync::Arc;

use payrev_core::{Money, TenantId, UserId};
use payrev_infra::{AuditSink, Clock, EngineConfig, LedgerStore, SystemClock, TracingAuditSink};
use payrev_ledger::{AllocationId, InvoiceId, PaymentAllocation, PaymentId};

use crate::analyzer::ImpactAnalyzer;
use crate::error::ReversalError;
use crate::executor::{CancelToken, ReversalExecutor};
use crate::history::{ReversalHistoryEntry, load_history};
use crate::report::{ImpactReport, ReversalResult};
use crate::validation::{ValidationReport, validate_allocations, validate_reason};

pub struct ReversalService<S, A, C> {
    store: Arc<S>,
    analyzer: ImpactAnalyzer<Arc<S>>,
    executor: ReversalExecutor<Arc<S>, A, C>,
}

impl<S, A, C> ReversalService<S, A, C>
where
    S: LedgerStore,
    A: AuditSink,
    C: Clock,
{
    pub fn new(store: Arc<S>, audit: A, clock: C, config: EngineConfig) -> Self {
        Self {
            analyzer: ImpactAnalyzer::new(Arc::clone(&store)),
            executor: ReversalExecutor::new(Arc::clone(&store), audit, clock, config),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn executor(&self) -> &ReversalExecutor<Arc<S>, A, C> {
        &self.executor
    }

    pub fn analyze_reversal_impact(
        &self,
        tenant_id: TenantId,
        allocation_ids: &[AllocationId],
    ) -> Result<ImpactReport, ReversalError> {
        self.analyzer.analyze(tenant_id, allocation_ids)
    }

    pub fn reverse_allocations(
        &self,
        tenant_id: TenantId,
        allocation_ids: &[AllocationId],
        reason: &str,
        actor: UserId,
    ) -> Result<ReversalResult, ReversalError> {
        self.executor.reverse(tenant_id, allocation_ids, reason, actor)
    }

    pub fn reverse_allocations_cancellable(
        &self,
        tenant_id: TenantId,
        allocation_ids: &[AllocationId],
        reason: &str,
        actor: UserId,
        cancel: &CancelToken,
    ) -> Result<ReversalResult, ReversalError> {
        self.executor
            .reverse_cancellable(tenant_id, allocation_ids, reason, actor, cancel)
    }

    /// Read-only pre-flight check of `allocation_ids`.
    pub fn validate_reversal(
        &self,
        tenant_id: TenantId,
        allocation_ids: &[AllocationId],
    ) -> Result<ValidationReport, ReversalError> {
        let config = self.executor.config();
        validate_allocations(
            self.store.as_ref(),
            tenant_id,
            allocation_ids,
            self.executor.clock().now(),
            config.max_allocation_age_days,
        )
    }

    /// Reverse every active allocation of a payment, oldest first.
    pub fn reverse_payment_allocations(
        &self,
        tenant_id: TenantId,
        payment_id: PaymentId,
        reason: &str,
        actor: UserId,
    ) -> Result<ReversalResult, ReversalError> {
        validate_reason(reason, self.executor.config().reason_limit())?;

        let mut active: Vec<PaymentAllocation> = self
            .store
            .allocations_for_payment(tenant_id, payment_id)?
            .into_iter()
            .filter(PaymentAllocation::is_active)
            .collect();
        if active.is_empty() {
            return Err(ReversalError::NoAllocationsFound);
        }
        active.sort_by(|a, b| {
            a.allocation_date()
                .cmp(&b.allocation_date())
                .then_with(|| a.id_typed().cmp(&b.id_typed()))
        });

        let ids: Vec<AllocationId> = active.iter().map(PaymentAllocation::id_typed).collect();
        self.executor.reverse(tenant_id, &ids, reason, actor)
    }

    /// Reverse an invoice's active allocations, newest first.
    ///
    /// With `max_amount`, only the longest newest-first run whose total stays
    /// within the limit is reversed.
    pub fn reverse_invoice_allocations(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        reason: &str,
        actor: UserId,
        max_amount: Option<Money>,
    ) -> Result<ReversalResult, ReversalError> {
        validate_reason(reason, self.executor.config().reason_limit())?;

        let mut active: Vec<PaymentAllocation> = self
            .store
            .allocations_for_invoice(tenant_id, invoice_id)?
            .into_iter()
            .filter(PaymentAllocation::is_active)
            .collect();
        active.sort_by(|a, b| {
            b.allocation_date()
                .cmp(&a.allocation_date())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });

        let mut ids = Vec::with_capacity(active.len());
        let mut running = Money::ZERO;
        for allocation in &active {
            if let Some(limit) = max_amount {
                let next = running.checked_add(allocation.allocated_amount())?;
                if next > limit {
                    break;
                }
                running = next;
            }
            ids.push(allocation.id_typed());
        }
        if ids.is_empty() {
            return Err(ReversalError::NoAllocationsFound);
        }

        let mut result = self.executor.reverse(tenant_id, &ids, reason, actor)?;
        result.max_amount_limit = max_amount;
        Ok(result)
    }

    pub fn reversal_history(
        &self,
        tenant_id: TenantId,
        allocation_ids: &[AllocationId],
    ) -> Result<Vec<ReversalHistoryEntry>, ReversalError> {
        load_history(self.store.as_ref(), tenant_id, allocation_ids)
    }
}

impl<S: LedgerStore> ReversalService<S, TracingAuditSink, SystemClock> {
    /// Production wiring: wall-clock timestamps, audit entries on the
    /// `audit` tracing target.
    pub fn with_system_defaults(store: Arc<S>, config: EngineConfig) -> Self {
        Self::new(store, TracingAuditSink, SystemClock, config)
    }
}
