use std::sync::Arc;

use thiserror::Error;

use crate::locks::LockManager;

use payrev_core::{ExpectedVersion, TenantId};
use payrev_ledger::{
    AllocationId, BatchId, Invoice, InvoiceId, Payment, PaymentAllocation, PaymentBatch, PaymentId,
};

/// Persistence failure.
///
/// These are infrastructure errors (storage, stale rows, isolation), as
/// opposed to the deterministic `DomainError`s raised by ledger records.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A row changed between read and write.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A write referenced a row the store does not hold.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A write mixed records of different tenants.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// Backend failure (I/O, constraint, poisoned lock, ...).
    #[error("storage error: {0}")]
    Storage(String),
}

/// The three row writes that make up one allocation reversal.
///
/// Applied as a single unit: either all three rows change or none do. The
/// `expected_*` versions are the versions the rows had when they were read
/// under lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalWrite {
    pub allocation: PaymentAllocation,
    pub payment: Payment,
    pub invoice: Invoice,
    pub expected_allocation: ExpectedVersion,
    pub expected_payment: ExpectedVersion,
    pub expected_invoice: ExpectedVersion,
}

impl ReversalWrite {
    /// Pair the mutated rows with the versions they were read at.
    pub fn new(
        read: (&PaymentAllocation, &Payment, &Invoice),
        allocation: PaymentAllocation,
        payment: Payment,
        invoice: Invoice,
    ) -> Self {
        let (read_allocation, read_payment, read_invoice) = read;
        Self {
            expected_allocation: ExpectedVersion::of(read_allocation),
            expected_payment: ExpectedVersion::of(read_payment),
            expected_invoice: ExpectedVersion::of(read_invoice),
            allocation,
            payment,
            invoice,
        }
    }

    pub fn allocation_id(&self) -> AllocationId {
        self.allocation.id_typed()
    }
}

/// Tenant-scoped read/write access to payments, invoices and allocations.
///
/// Every read is scoped by the caller-supplied tenant; records of another
/// tenant are simply invisible (`Ok(None)` / empty).
pub trait LedgerStore: Send + Sync {
    fn allocation(
        &self,
        tenant_id: TenantId,
        id: AllocationId,
    ) -> Result<Option<PaymentAllocation>, StoreError>;

    fn payment(&self, tenant_id: TenantId, id: PaymentId) -> Result<Option<Payment>, StoreError>;

    fn invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;

    fn batch(&self, tenant_id: TenantId, id: BatchId) -> Result<Option<PaymentBatch>, StoreError>;

    /// All allocations (active and reversed) of a payment.
    fn allocations_for_payment(
        &self,
        tenant_id: TenantId,
        payment_id: PaymentId,
    ) -> Result<Vec<PaymentAllocation>, StoreError>;

    /// All allocations (active and reversed) against an invoice.
    fn allocations_for_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<PaymentAllocation>, StoreError>;

    /// Atomically persist one allocation reversal.
    fn commit_reversal(&self, tenant_id: TenantId, write: &ReversalWrite)
    -> Result<(), StoreError>;

    /// Row locks guarding this store's payments and invoices. Every handle
    /// onto the same storage must return the same table.
    fn row_locks(&self) -> &LockManager;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn allocation(
        &self,
        tenant_id: TenantId,
        id: AllocationId,
    ) -> Result<Option<PaymentAllocation>, StoreError> {
        (**self).allocation(tenant_id, id)
    }

    fn payment(&self, tenant_id: TenantId, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        (**self).payment(tenant_id, id)
    }

    fn invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        (**self).invoice(tenant_id, id)
    }

    fn batch(&self, tenant_id: TenantId, id: BatchId) -> Result<Option<PaymentBatch>, StoreError> {
        (**self).batch(tenant_id, id)
    }

    fn allocations_for_payment(
        &self,
        tenant_id: TenantId,
        payment_id: PaymentId,
    ) -> Result<Vec<PaymentAllocation>, StoreError> {
        (**self).allocations_for_payment(tenant_id, payment_id)
    }

    fn allocations_for_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<PaymentAllocation>, StoreError> {
        (**self).allocations_for_invoice(tenant_id, invoice_id)
    }

    fn commit_reversal(
        &self,
        tenant_id: TenantId,
        write: &ReversalWrite,
    ) -> Result<(), StoreError> {
        (**self).commit_reversal(tenant_id, write)
    }

    fn row_locks(&self) -> &LockManager {
        (**self).row_locks()
    }
}
