//! Input validation and read-only pre-flight checks.

use chrono::{DateTime, Utc};
use serde::Serialize;

use payrev_core::{Money, TenantId};
use payrev_infra::LedgerStore;
use payrev_ledger::{AllocationId, InvoiceId, PaymentId};

use crate::error::ReversalError;

/// Reason must be non-blank and at most `max_len` characters.
pub fn validate_reason(reason: &str, max_len: usize) -> Result<(), ReversalError> {
    if reason.trim().is_empty() {
        return Err(ReversalError::InvalidReason("reason is required".to_string()));
    }
    let len = reason.chars().count();
    if len > max_len {
        return Err(ReversalError::InvalidReason(format!(
            "reason is {len} characters; at most {max_len} allowed"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    NotFound {
        allocation_id: AllocationId,
    },
    AlreadyReversed {
        allocation_id: AllocationId,
    },
    InvoiceCancelled {
        allocation_id: AllocationId,
        invoice_id: InvoiceId,
    },
    TooOld {
        allocation_id: AllocationId,
        age_days: i64,
        max_days: i64,
    },
    MissingRecord {
        allocation_id: AllocationId,
        record: String,
    },
}

impl core::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ValidationIssue::NotFound { allocation_id } => {
                write!(f, "allocation {allocation_id} not found")
            }
            ValidationIssue::AlreadyReversed { allocation_id } => {
                write!(f, "allocation {allocation_id} is already reversed")
            }
            ValidationIssue::InvoiceCancelled {
                allocation_id,
                invoice_id,
            } => write!(
                f,
                "allocation {allocation_id}: associated invoice {invoice_id} is cancelled"
            ),
            ValidationIssue::TooOld {
                allocation_id,
                age_days,
                max_days,
            } => write!(
                f,
                "allocation {allocation_id} is {age_days} days old; reversals allowed up to {max_days} days"
            ),
            ValidationIssue::MissingRecord {
                allocation_id,
                record,
            } => write!(f, "allocation {allocation_id}: {record} not found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversibleAllocation {
    pub allocation_id: AllocationId,
    pub allocated_amount: Money,
    pub allocation_date: DateTime<Utc>,
    pub payment_id: PaymentId,
    pub payment_number: String,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
}

/// Pre-flight verdict. `valid` iff `errors` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub allocations: Vec<ReversibleAllocation>,
}

pub(crate) fn validate_allocations<S: LedgerStore>(
    store: &S,
    tenant_id: TenantId,
    ids: &[AllocationId],
    now: DateTime<Utc>,
    max_age_days: i64,
) -> Result<ValidationReport, ReversalError> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut allocations = Vec::new();

    for &allocation_id in ids {
        let Some(allocation) = store.allocation(tenant_id, allocation_id)? else {
            errors.push(ValidationIssue::NotFound { allocation_id });
            continue;
        };
        if !allocation.is_active() {
            warnings.push(ValidationIssue::AlreadyReversed { allocation_id });
            continue;
        }

        let age_days = (now - allocation.allocation_date()).num_days();
        if age_days > max_age_days {
            errors.push(ValidationIssue::TooOld {
                allocation_id,
                age_days,
                max_days: max_age_days,
            });
            continue;
        }

        let Some(invoice) = store.invoice(tenant_id, allocation.invoice_id())? else {
            errors.push(ValidationIssue::MissingRecord {
                allocation_id,
                record: format!("invoice {}", allocation.invoice_id()),
            });
            continue;
        };
        if invoice.is_cancelled() {
            errors.push(ValidationIssue::InvoiceCancelled {
                allocation_id,
                invoice_id: invoice.id_typed(),
            });
            continue;
        }

        let Some(payment) = store.payment(tenant_id, allocation.payment_id())? else {
            errors.push(ValidationIssue::MissingRecord {
                allocation_id,
                record: format!("payment {}", allocation.payment_id()),
            });
            continue;
        };

        allocations.push(ReversibleAllocation {
            allocation_id,
            allocated_amount: allocation.allocated_amount(),
            allocation_date: allocation.allocation_date(),
            payment_id: payment.id_typed(),
            payment_number: payment.payment_number().to_string(),
            invoice_id: invoice.id_typed(),
            invoice_number: invoice.invoice_number().to_string(),
        });
    }

    Ok(ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        allocations,
    })
}
