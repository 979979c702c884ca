use serde::{Deserialize, Serialize};

use payrev_core::{AggregateId, AggregateRoot, DomainError, DomainResult, Money, TenantId};

use crate::status::{InvoicePaymentStatus, invoice_status};

/// Invoice identifier (tenant-scoped via the owning record's `tenant_id`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Receivable document.
///
/// `balance_due = total_amount - Σ active allocations`. The balance is never
/// clamped to `total_amount`; a balance above total signals upstream
/// corruption and is surfaced by the impact analyzer instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: TenantId,
    invoice_number: String,
    total_amount: Money,
    balance_due: Money,
    cancelled: bool,
    version: u64,
}

impl Invoice {
    /// A freshly issued invoice with nothing allocated against it.
    pub fn issue(
        tenant_id: TenantId,
        id: InvoiceId,
        invoice_number: impl Into<String>,
        total_amount: Money,
    ) -> DomainResult<Self> {
        if !total_amount.is_positive() {
            return Err(DomainError::validation("invoice total must be positive"));
        }
        Ok(Self {
            id,
            tenant_id,
            invoice_number: invoice_number.into(),
            total_amount,
            balance_due: total_amount,
            cancelled: false,
            version: 0,
        })
    }

    /// Rehydrate a persisted invoice.
    pub fn restore(
        tenant_id: TenantId,
        id: InvoiceId,
        invoice_number: impl Into<String>,
        total_amount: Money,
        balance_due: Money,
        cancelled: bool,
        version: u64,
    ) -> Self {
        Self {
            id,
            tenant_id,
            invoice_number: invoice_number.into(),
            total_amount,
            balance_due,
            cancelled,
            version,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn balance_due(&self) -> Money {
        self.balance_due
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Amount currently covered by active allocations.
    pub fn allocated_total(&self) -> DomainResult<Money> {
        self.total_amount.checked_sub(self.balance_due)
    }

    pub fn status(&self) -> InvoicePaymentStatus {
        invoice_status(self.balance_due, self.total_amount)
    }

    /// Balance the invoice would carry once `released` is handed back.
    pub fn projected_balance(&self, released: Money) -> DomainResult<Money> {
        self.balance_due.checked_add(released)
    }

    /// Reversal path: give an allocation's amount back to the balance.
    pub fn release_allocation(&mut self, amount: Money) -> DomainResult<()> {
        if !amount.is_positive() {
            return Err(DomainError::validation("released amount must be positive"));
        }
        self.balance_due = self.projected_balance(amount)?;
        self.version += 1;
        Ok(())
    }

    /// Document lifecycle: cancelled invoices refuse further reversals.
    pub fn cancel(&mut self) -> DomainResult<()> {
        if self.cancelled {
            return Err(DomainError::conflict("invoice is already cancelled"));
        }
        self.cancelled = true;
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
