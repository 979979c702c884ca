//! Reports returned to callers: the impact preview and the execution result.
//!
//! Both are ephemeral values; callers render them (table, JSON) as they see fit.

use serde::Serialize;

use payrev_core::Money;
use payrev_ledger::{
    AllocationId, BatchId, BatchStatus, InvoiceId, InvoicePaymentStatus, PaymentId, PaymentStatus,
};

/// Projected effect on one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceImpact {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub total_amount: Money,
    pub current_balance: Money,
    pub reversal_amount: Money,
    /// Exact balance after the reversal; equals what execution will write.
    pub projected_balance: Money,
    /// `projected_balance` capped at `total_amount`, for display only.
    pub display_balance: Money,
    pub current_status: InvoicePaymentStatus,
    pub projected_status: InvoicePaymentStatus,
    pub allocation_ids: Vec<AllocationId>,
}

/// Projected effect on one payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentImpact {
    pub payment_id: PaymentId,
    pub payment_number: String,
    pub amount: Money,
    pub current_allocated_total: Money,
    /// Not clamped: a negative value is reported as a warning.
    pub projected_allocated_total: Money,
    pub reversal_amount: Money,
    /// Capacity freed by the reversal (always `+reversal_amount`).
    pub remaining_change: Money,
    pub current_remaining: Money,
    pub projected_remaining: Money,
    pub current_status: PaymentStatus,
    pub projected_status: PaymentStatus,
    pub allocation_ids: Vec<AllocationId>,
}

/// Advisory finding. Never blocks execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImpactWarning {
    /// Some requested ids are already reversed or do not exist in scope.
    UnresolvedAllocations {
        requested: usize,
        already_reversed: usize,
        missing: usize,
    },
    /// The same id was requested more than once; it is counted once.
    DuplicateRequest {
        allocation_id: AllocationId,
        occurrences: usize,
    },
    StatusDowngrade {
        invoice_id: InvoiceId,
        from: InvoicePaymentStatus,
        to: InvoicePaymentStatus,
    },
    /// Projected balance would exceed the invoice total (corrupt history).
    BalanceExceedsTotal {
        invoice_id: InvoiceId,
        projected_balance: Money,
        total_amount: Money,
    },
    /// Projected allocated total would go negative (corrupt history).
    NegativeAllocatedTotal {
        payment_id: PaymentId,
        projected_allocated_total: Money,
    },
    /// The payment's ingestion batch has not finished; its allocations may
    /// still change underneath this preview.
    BatchInFlight {
        payment_id: PaymentId,
        batch_id: BatchId,
        status: BatchStatus,
    },
    MissingInvoice {
        invoice_id: InvoiceId,
    },
    MissingPayment {
        payment_id: PaymentId,
    },
}

impl core::fmt::Display for ImpactWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ImpactWarning::UnresolvedAllocations {
                requested,
                already_reversed,
                missing,
            } => write!(
                f,
                "{} of {requested} allocations already reversed or missing ({already_reversed} reversed, {missing} missing)",
                already_reversed + missing
            ),
            ImpactWarning::DuplicateRequest {
                allocation_id,
                occurrences,
            } => write!(
                f,
                "allocation {allocation_id} requested {occurrences} times; counted once"
            ),
            ImpactWarning::StatusDowngrade { invoice_id, from, to } => {
                write!(f, "invoice {invoice_id} status changes from {from} to {to}")
            }
            ImpactWarning::BalanceExceedsTotal {
                invoice_id,
                projected_balance,
                total_amount,
            } => write!(
                f,
                "invoice {invoice_id} projected balance {projected_balance} exceeds total {total_amount}"
            ),
            ImpactWarning::NegativeAllocatedTotal {
                payment_id,
                projected_allocated_total,
            } => write!(
                f,
                "payment {payment_id} projected allocated total {projected_allocated_total} is negative"
            ),
            ImpactWarning::BatchInFlight {
                payment_id,
                batch_id,
                status,
            } => write!(
                f,
                "payment {payment_id} belongs to batch {batch_id} which is still {status:?}"
            ),
            ImpactWarning::MissingInvoice { invoice_id } => {
                write!(f, "invoice {invoice_id} referenced by an allocation was not found")
            }
            ImpactWarning::MissingPayment { payment_id } => {
                write!(f, "payment {payment_id} referenced by an allocation was not found")
            }
        }
    }
}

/// Read-only preview of a reversal batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactReport {
    pub requested_count: usize,
    /// Active allocations the preview was computed from (ascending id order).
    pub analyzed_allocations: Vec<AllocationId>,
    pub total_reversal_amount: Money,
    pub invoices: Vec<InvoiceImpact>,
    pub payments: Vec<PaymentImpact>,
    pub warnings: Vec<ImpactWarning>,
}

impl ImpactReport {
    pub fn invoices_affected(&self) -> usize {
        self.invoices.len()
    }

    pub fn payments_affected(&self) -> usize {
        self.payments.len()
    }

    pub fn invoice(&self, id: InvoiceId) -> Option<&InvoiceImpact> {
        self.invoices.iter().find(|i| i.invoice_id == id)
    }

    pub fn payment(&self, id: PaymentId) -> Option<&PaymentImpact> {
        self.payments.iter().find(|p| p.payment_id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalOutcome {
    Reversed,
    AlreadyReversed,
    Error,
}

/// What happened to one requested allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub allocation_id: AllocationId,
    pub outcome: ReversalOutcome,
    pub message: String,
    pub reversed_amount: Option<Money>,
}

impl ItemResult {
    pub(crate) fn reversed(allocation_id: AllocationId, amount: Money) -> Self {
        Self {
            allocation_id,
            outcome: ReversalOutcome::Reversed,
            message: "Allocation successfully reversed".to_string(),
            reversed_amount: Some(amount),
        }
    }

    pub(crate) fn already_reversed(allocation_id: AllocationId) -> Self {
        Self {
            allocation_id,
            outcome: ReversalOutcome::AlreadyReversed,
            message: "Allocation was already reversed".to_string(),
            reversed_amount: None,
        }
    }

    pub(crate) fn error(allocation_id: AllocationId, message: impl Into<String>) -> Self {
        Self {
            allocation_id,
            outcome: ReversalOutcome::Error,
            message: message.into(),
            reversed_amount: None,
        }
    }
}

/// Itemised outcome of a reversal call, in caller-supplied order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversalResult {
    pub total_processed: usize,
    pub reversed_count: usize,
    pub already_reversed_count: usize,
    pub error_count: usize,
    pub results: Vec<ItemResult>,
    /// Ids left untouched because the call was cancelled.
    pub unprocessed: Vec<AllocationId>,
    pub cancelled: bool,
    /// Cap applied when allocations were selected by invoice.
    pub max_amount_limit: Option<Money>,
}

impl ReversalResult {
    pub(crate) fn from_items(results: Vec<ItemResult>, unprocessed: Vec<AllocationId>) -> Self {
        let count = |o: ReversalOutcome| results.iter().filter(|r| r.outcome == o).count();
        Self {
            total_processed: results.len(),
            reversed_count: count(ReversalOutcome::Reversed),
            already_reversed_count: count(ReversalOutcome::AlreadyReversed),
            error_count: count(ReversalOutcome::Error),
            cancelled: !unprocessed.is_empty(),
            unprocessed,
            results,
            max_amount_limit: None,
        }
    }

    pub fn outcomes(&self) -> Vec<ReversalOutcome> {
        self.results.iter().map(|r| r.outcome).collect()
    }

    pub fn total_reversed_amount(&self) -> Money {
        Money::try_sum(self.results.iter().filter_map(|r| r.reversed_amount)).unwrap_or(Money::ZERO)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Ids whose reversal failed, in processing order.
    pub fn failed_ids(&self) -> Vec<AllocationId> {
        self.results
            .iter()
            .filter(|r| r.outcome == ReversalOutcome::Error)
            .map(|r| r.allocation_id)
            .collect()
    }
}
