use chrono::{DateTime, Utc};
use serde::Serialize;

use payrev_core::{Money, TenantId, UserId};
use payrev_infra::LedgerStore;
use payrev_ledger::{AllocationId, AllocationState, InvoiceId, PaymentAllocation, PaymentId};

use crate::error::ReversalError;

/// One reversed allocation, as shown in an audit view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversalHistoryEntry {
    pub allocation_id: AllocationId,
    pub reversed_at: DateTime<Utc>,
    pub reason: String,
    pub reversed_by: UserId,
    pub allocated_amount: Money,
    pub allocation_date: DateTime<Utc>,
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
}

impl ReversalHistoryEntry {
    /// `None` for active allocations.
    pub fn from_allocation(allocation: &PaymentAllocation) -> Option<Self> {
        let AllocationState::Reversed { at, reason, by } = allocation.state() else {
            return None;
        };
        Some(Self {
            allocation_id: allocation.id_typed(),
            reversed_at: *at,
            reason: reason.clone(),
            reversed_by: *by,
            allocated_amount: allocation.allocated_amount(),
            allocation_date: allocation.allocation_date(),
            payment_id: allocation.payment_id(),
            invoice_id: allocation.invoice_id(),
        })
    }
}

/// Reversed allocations among `ids`, most recent reversal first.
///
/// Unknown and active ids are skipped; each id appears at most once.
pub(crate) fn load_history<S: LedgerStore>(
    store: &S,
    tenant_id: TenantId,
    ids: &[AllocationId],
) -> Result<Vec<ReversalHistoryEntry>, ReversalError> {
    let mut unique = ids.to_vec();
    unique.sort();
    unique.dedup();

    let mut entries = Vec::new();
    for id in unique {
        if let Some(allocation) = store.allocation(tenant_id, id)? {
            entries.extend(ReversalHistoryEntry::from_allocation(&allocation));
        }
    }
    entries.sort_by(|a, b| {
        b.reversed_at
            .cmp(&a.reversed_at)
            .then_with(|| a.allocation_id.cmp(&b.allocation_id))
    });
    Ok(entries)
}
