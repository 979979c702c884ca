use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use payrev_core::{AggregateRoot, ExpectedVersion, TenantId};
use payrev_ledger::{
    AllocationId, BatchId, Invoice, InvoiceId, Payment, PaymentAllocation, PaymentBatch, PaymentId,
};

use super::r#trait::{LedgerStore, ReversalWrite, StoreError};
use crate::locks::LockManager;

#[derive(Debug, Default)]
struct Tables {
    payments: HashMap<(TenantId, PaymentId), Payment>,
    invoices: HashMap<(TenantId, InvoiceId), Invoice>,
    allocations: HashMap<(TenantId, AllocationId), PaymentAllocation>,
    batches: HashMap<(TenantId, BatchId), PaymentBatch>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. All tables live behind one lock, which makes
/// `commit_reversal` trivially atomic. Row locks live beside the tables.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tables: RwLock<Tables>,
    locks: LockManager,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose row locks wait at most `timeout` unless the caller says otherwise.
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self {
            tables: RwLock::default(),
            locks: LockManager::new(timeout),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    /// Insert or replace a payment (fixtures / forward path).
    pub fn put_payment(&self, payment: Payment) -> Result<(), StoreError> {
        let key = (payment.tenant_id(), payment.id_typed());
        self.write()?.payments.insert(key, payment);
        Ok(())
    }

    pub fn put_invoice(&self, invoice: Invoice) -> Result<(), StoreError> {
        let key = (invoice.tenant_id(), invoice.id_typed());
        self.write()?.invoices.insert(key, invoice);
        Ok(())
    }

    pub fn put_allocation(&self, allocation: PaymentAllocation) -> Result<(), StoreError> {
        let key = (allocation.tenant_id(), allocation.id_typed());
        self.write()?.allocations.insert(key, allocation);
        Ok(())
    }

    pub fn put_batch(&self, batch: PaymentBatch) -> Result<(), StoreError> {
        let key = (batch.tenant_id(), batch.id_typed());
        self.write()?.batches.insert(key, batch);
        Ok(())
    }

    pub fn list_payments(&self, tenant_id: TenantId) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .read()?
            .payments
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, p)| p.clone())
            .collect())
    }

    pub fn list_invoices(&self, tenant_id: TenantId) -> Result<Vec<Invoice>, StoreError> {
        Ok(self
            .read()?
            .invoices
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, i)| i.clone())
            .collect())
    }

    pub fn list_allocations(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<PaymentAllocation>, StoreError> {
        Ok(self
            .read()?
            .allocations
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, a)| a.clone())
            .collect())
    }
}

fn check_version(
    what: &str,
    id: impl core::fmt::Display,
    expected: ExpectedVersion,
    actual: u64,
) -> Result<(), StoreError> {
    if expected.matches(actual) {
        Ok(())
    } else {
        Err(StoreError::Concurrency(format!(
            "{what} {id}: expected {expected:?}, found {actual}"
        )))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn allocation(
        &self,
        tenant_id: TenantId,
        id: AllocationId,
    ) -> Result<Option<PaymentAllocation>, StoreError> {
        Ok(self.read()?.allocations.get(&(tenant_id, id)).cloned())
    }

    fn payment(&self, tenant_id: TenantId, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        Ok(self.read()?.payments.get(&(tenant_id, id)).cloned())
    }

    fn invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self.read()?.invoices.get(&(tenant_id, id)).cloned())
    }

    fn batch(&self, tenant_id: TenantId, id: BatchId) -> Result<Option<PaymentBatch>, StoreError> {
        Ok(self.read()?.batches.get(&(tenant_id, id)).cloned())
    }

    fn allocations_for_payment(
        &self,
        tenant_id: TenantId,
        payment_id: PaymentId,
    ) -> Result<Vec<PaymentAllocation>, StoreError> {
        Ok(self
            .read()?
            .allocations
            .iter()
            .filter(|((t, _), a)| *t == tenant_id && a.payment_id() == payment_id)
            .map(|(_, a)| a.clone())
            .collect())
    }

    fn allocations_for_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<PaymentAllocation>, StoreError> {
        Ok(self
            .read()?
            .allocations
            .iter()
            .filter(|((t, _), a)| *t == tenant_id && a.invoice_id() == invoice_id)
            .map(|(_, a)| a.clone())
            .collect())
    }

    fn commit_reversal(
        &self,
        tenant_id: TenantId,
        write: &ReversalWrite,
    ) -> Result<(), StoreError> {
        let allocation = &write.allocation;
        let payment = &write.payment;
        let invoice = &write.invoice;

        if allocation.tenant_id() != tenant_id
            || payment.tenant_id() != tenant_id
            || invoice.tenant_id() != tenant_id
        {
            return Err(StoreError::TenantIsolation(format!(
                "reversal of allocation {} mixes tenants",
                allocation.id_typed()
            )));
        }
        if allocation.payment_id() != payment.id_typed()
            || allocation.invoice_id() != invoice.id_typed()
        {
            return Err(StoreError::Storage(format!(
                "allocation {} does not reference the supplied payment/invoice",
                allocation.id_typed()
            )));
        }

        let mut tables = self.write()?;

        // Validate every row before touching any of them.
        let a_key = (tenant_id, allocation.id_typed());
        let p_key = (tenant_id, payment.id_typed());
        let i_key = (tenant_id, invoice.id_typed());

        let stored = tables
            .allocations
            .get(&a_key)
            .ok_or_else(|| StoreError::NotFound(format!("allocation {}", a_key.1)))?;
        check_version("allocation", a_key.1, write.expected_allocation, stored.version())?;

        let stored = tables
            .payments
            .get(&p_key)
            .ok_or_else(|| StoreError::NotFound(format!("payment {}", p_key.1)))?;
        check_version("payment", p_key.1, write.expected_payment, stored.version())?;

        let stored = tables
            .invoices
            .get(&i_key)
            .ok_or_else(|| StoreError::NotFound(format!("invoice {}", i_key.1)))?;
        check_version("invoice", i_key.1, write.expected_invoice, stored.version())?;

        tables.allocations.insert(a_key, allocation.clone());
        tables.payments.insert(p_key, payment.clone());
        tables.invoices.insert(i_key, invoice.clone());
        Ok(())
    }

    fn row_locks(&self) -> &LockManager {
        &self.locks
    }
}
