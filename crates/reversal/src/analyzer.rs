//! Read-only impact preview.
//!
//! Effects are summed per invoice and per payment before any projection is
//! computed, so a record touched by several allocations in one request is
//! projected once from its current persisted state.

use std::collections::{BTreeMap, HashMap};

use payrev_core::{Money, TenantId};
use payrev_infra::LedgerStore;
use payrev_ledger::{
    AllocationId, InvoiceId, PaymentAllocation, PaymentId, invoice_status, payment_status,
};

use crate::error::ReversalError;
use crate::report::{ImpactReport, ImpactWarning, InvoiceImpact, PaymentImpact};

/// Active allocations sharing one invoice or one payment.
#[derive(Debug, Default)]
struct Group {
    amount: Money,
    allocation_ids: Vec<AllocationId>,
}

impl Group {
    fn add(&mut self, allocation: &PaymentAllocation) -> Result<(), ReversalError> {
        self.amount = self.amount.checked_add(allocation.allocated_amount())?;
        self.allocation_ids.push(allocation.id_typed());
        Ok(())
    }
}

pub struct ImpactAnalyzer<S> {
    store: S,
}

impl<S: LedgerStore> ImpactAnalyzer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compute the projected effect of reversing `allocation_ids`.
    ///
    /// Fails only when the request is empty or none of the ids exist in the
    /// tenant's scope. Everything else is reported as a warning.
    pub fn analyze(
        &self,
        tenant_id: TenantId,
        allocation_ids: &[AllocationId],
    ) -> Result<ImpactReport, ReversalError> {
        if allocation_ids.is_empty() {
            return Err(ReversalError::NoAllocationsFound);
        }

        let mut warnings = Vec::new();

        let mut occurrences: BTreeMap<AllocationId, usize> = BTreeMap::new();
        for id in allocation_ids {
            *occurrences.entry(*id).or_default() += 1;
        }
        for (&allocation_id, &count) in &occurrences {
            if count > 1 {
                warnings.push(ImpactWarning::DuplicateRequest {
                    allocation_id,
                    occurrences: count,
                });
            }
        }

        let mut active = Vec::new();
        let mut already_reversed = 0usize;
        let mut missing = 0usize;
        for &id in occurrences.keys() {
            match self.store.allocation(tenant_id, id)? {
                Some(allocation) if allocation.is_active() => active.push(allocation),
                Some(_) => already_reversed += 1,
                None => missing += 1,
            }
        }

        if missing == occurrences.len() {
            tracing::debug!(
                tenant_id = %tenant_id,
                requested = allocation_ids.len(),
                "no requested allocation exists in scope"
            );
            return Err(ReversalError::NoAllocationsFound);
        }
        if already_reversed + missing > 0 {
            warnings.push(ImpactWarning::UnresolvedAllocations {
                requested: occurrences.len(),
                already_reversed,
                missing,
            });
        }

        let mut by_invoice: BTreeMap<InvoiceId, Group> = BTreeMap::new();
        let mut by_payment: BTreeMap<PaymentId, Group> = BTreeMap::new();
        for allocation in &active {
            by_invoice
                .entry(allocation.invoice_id())
                .or_default()
                .add(allocation)?;
            by_payment
                .entry(allocation.payment_id())
                .or_default()
                .add(allocation)?;
        }

        let total_reversal_amount =
            Money::try_sum(active.iter().map(PaymentAllocation::allocated_amount))?;

        let mut invoices = Vec::with_capacity(by_invoice.len());
        for (invoice_id, group) in by_invoice {
            let Some(invoice) = self.store.invoice(tenant_id, invoice_id)? else {
                warnings.push(ImpactWarning::MissingInvoice { invoice_id });
                continue;
            };

            let projected_balance = invoice.projected_balance(group.amount)?;
            let total_amount = invoice.total_amount();
            let current_status = invoice.status();
            let projected_status = invoice_status(projected_balance, total_amount);

            if projected_balance > total_amount {
                warnings.push(ImpactWarning::BalanceExceedsTotal {
                    invoice_id,
                    projected_balance,
                    total_amount,
                });
            }
            if projected_status != current_status {
                warnings.push(ImpactWarning::StatusDowngrade {
                    invoice_id,
                    from: current_status,
                    to: projected_status,
                });
            }

            invoices.push(InvoiceImpact {
                invoice_id,
                invoice_number: invoice.invoice_number().to_string(),
                total_amount,
                current_balance: invoice.balance_due(),
                reversal_amount: group.amount,
                projected_balance,
                display_balance: projected_balance.min(total_amount),
                current_status,
                projected_status,
                allocation_ids: group.allocation_ids,
            });
        }

        let mut batch_status = HashMap::new();
        let mut payments = Vec::with_capacity(by_payment.len());
        for (payment_id, group) in by_payment {
            let Some(payment) = self.store.payment(tenant_id, payment_id)? else {
                warnings.push(ImpactWarning::MissingPayment { payment_id });
                continue;
            };

            let current_allocated_total = payment.allocated_total()?;
            let projected_allocated_total = current_allocated_total.checked_sub(group.amount)?;
            let current_remaining = payment.remaining_amount();
            let projected_remaining = current_remaining.checked_add(group.amount)?;

            if projected_allocated_total.is_negative() {
                warnings.push(ImpactWarning::NegativeAllocatedTotal {
                    payment_id,
                    projected_allocated_total,
                });
            }

            if let Some(batch_id) = payment.batch_id() {
                if !batch_status.contains_key(&batch_id) {
                    let status = self
                        .store
                        .batch(tenant_id, batch_id)?
                        .map(|batch| batch.status());
                    batch_status.insert(batch_id, status);
                }
                if let Some(Some(status)) = batch_status.get(&batch_id) {
                    if !status.is_terminal() {
                        warnings.push(ImpactWarning::BatchInFlight {
                            payment_id,
                            batch_id,
                            status: *status,
                        });
                    }
                }
            }

            payments.push(PaymentImpact {
                payment_id,
                payment_number: payment.payment_number().to_string(),
                amount: payment.amount(),
                current_allocated_total,
                projected_allocated_total,
                reversal_amount: group.amount,
                remaining_change: group.amount,
                current_remaining,
                projected_remaining,
                current_status: payment.status(),
                projected_status: payment_status(projected_remaining, payment.amount()),
                allocation_ids: group.allocation_ids,
            });
        }

        let report = ImpactReport {
            requested_count: allocation_ids.len(),
            analyzed_allocations: active.iter().map(PaymentAllocation::id_typed).collect(),
            total_reversal_amount,
            invoices,
            payments,
            warnings,
        };

        tracing::info!(
            tenant_id = %tenant_id,
            requested = report.requested_count,
            analyzed = report.analyzed_allocations.len(),
            invoices_affected = report.invoices_affected(),
            payments_affected = report.payments_affected(),
            warnings = report.warnings.len(),
            total = %report.total_reversal_amount,
            "reversal impact analyzed"
        );
        for warning in &report.warnings {
            tracing::warn!(tenant_id = %tenant_id, warning = %warning, "reversal impact warning");
        }

        Ok(report)
    }
}
