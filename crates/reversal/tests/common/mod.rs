#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use payrev_core::{AggregateId, AggregateRoot, Money, TenantId};
use payrev_infra::{
    Clock, EngineConfig, FixedClock, InMemoryAuditSink, InMemoryLedgerStore, LedgerStore,
    LockManager, ReversalWrite, StoreError,
};
use payrev_ledger::{
    AllocationId, AllocationStrategy, BatchId, Invoice, InvoiceId, Payment, PaymentAllocation,
    PaymentBatch, PaymentId,
};
use payrev_reversal::ReversalService;

pub type Service<S> = ReversalService<S, Arc<InMemoryAuditSink>, Arc<FixedClock>>;

pub fn money(units: i64, cents: i64) -> Money {
    Money::new(units, cents)
}

pub fn start_of_test() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 15, 10, 30, 0).unwrap()
}

/// One tenant's books, seeded through the forward-allocation path.
pub struct Books {
    pub tenant: TenantId,
    pub store: Arc<InMemoryLedgerStore>,
    pub audit: Arc<InMemoryAuditSink>,
    pub clock: Arc<FixedClock>,
}

impl Books {
    pub fn new() -> Self {
        payrev_observability::init_with_default("payrev=debug,warn");
        Self {
            tenant: TenantId::new(),
            store: Arc::new(InMemoryLedgerStore::new()),
            audit: Arc::new(InMemoryAuditSink::new()),
            clock: Arc::new(FixedClock::new(start_of_test())),
        }
    }

    pub fn invoice(&self, number: &str, total: Money) -> InvoiceId {
        let id = InvoiceId::new(AggregateId::new());
        let invoice = Invoice::issue(self.tenant, id, number, total).unwrap();
        self.store.put_invoice(invoice).unwrap();
        id
    }

    pub fn payment(&self, number: &str, amount: Money) -> PaymentId {
        self.payment_in_batch(number, amount, None)
    }

    pub fn payment_in_batch(
        &self,
        number: &str,
        amount: Money,
        batch_id: Option<BatchId>,
    ) -> PaymentId {
        let id = PaymentId::new(AggregateId::new());
        let payment = Payment::record(self.tenant, id, number, amount, batch_id).unwrap();
        self.store.put_payment(payment).unwrap();
        id
    }

    pub fn batch(&self, receipts: u32, total: Money) -> BatchId {
        let id = BatchId::new(AggregateId::new());
        self.store
            .put_batch(PaymentBatch::new(self.tenant, id, "BATCH-1", receipts, total))
            .unwrap();
        id
    }

    /// Allocate `amount` of `payment` to `invoice`, adjusting both balances
    /// the way the forward-allocation path does.
    pub fn allocate(
        &self,
        payment_id: PaymentId,
        invoice_id: InvoiceId,
        amount: Money,
    ) -> AllocationId {
        let invoice = self.invoice_state(invoice_id);
        let payment = self.payment_state(payment_id);

        self.store
            .put_invoice(Invoice::restore(
                self.tenant,
                invoice_id,
                invoice.invoice_number(),
                invoice.total_amount(),
                invoice.balance_due().checked_sub(amount).unwrap(),
                invoice.is_cancelled(),
                invoice.version() + 1,
            ))
            .unwrap();
        self.store
            .put_payment(Payment::restore(
                self.tenant,
                payment_id,
                payment.payment_number(),
                payment.amount(),
                payment.remaining_amount().checked_sub(amount).unwrap(),
                payment.batch_id(),
                payment.version() + 1,
            ))
            .unwrap();

        let id = AllocationId::new(AggregateId::new());
        let allocation = PaymentAllocation::new(
            self.tenant,
            id,
            payment_id,
            invoice_id,
            amount,
            self.clock.now(),
            AllocationStrategy::Manual,
        )
        .unwrap();
        self.store.put_allocation(allocation).unwrap();
        id
    }

    pub fn invoice_state(&self, id: InvoiceId) -> Invoice {
        self.store.invoice(self.tenant, id).unwrap().unwrap()
    }

    pub fn payment_state(&self, id: PaymentId) -> Payment {
        self.store.payment(self.tenant, id).unwrap().unwrap()
    }

    pub fn allocation_state(&self, id: AllocationId) -> PaymentAllocation {
        self.store.allocation(self.tenant, id).unwrap().unwrap()
    }

    pub fn service(&self) -> Service<InMemoryLedgerStore> {
        self.service_over(Arc::clone(&self.store))
    }

    pub fn service_over<S: LedgerStore>(&self, store: Arc<S>) -> Service<S> {
        ReversalService::new(
            store,
            Arc::clone(&self.audit),
            Arc::clone(&self.clock),
            EngineConfig::default(),
        )
    }

    /// Balance and payment conservation over every record of the tenant.
    pub fn assert_conserved(&self) {
        let allocations = self.store.list_allocations(self.tenant).unwrap();
        let active_sum = |pred: &dyn Fn(&PaymentAllocation) -> bool| {
            Money::try_sum(
                allocations
                    .iter()
                    .filter(|a| a.is_active() && pred(a))
                    .map(PaymentAllocation::allocated_amount),
            )
            .unwrap()
        };

        for invoice in self.store.list_invoices(self.tenant).unwrap() {
            let id = invoice.id_typed();
            let covered = active_sum(&|a| a.invoice_id() == id);
            assert!(
                invoice
                    .balance_due()
                    .checked_add(covered)
                    .unwrap()
                    .approx_eq(invoice.total_amount()),
                "invoice {} not conserved: balance {} + active {} != total {}",
                invoice.invoice_number(),
                invoice.balance_due(),
                covered,
                invoice.total_amount()
            );
        }
        for payment in self.store.list_payments(self.tenant).unwrap() {
            let id = payment.id_typed();
            let used = active_sum(&|a| a.payment_id() == id);
            assert!(
                payment
                    .remaining_amount()
                    .checked_add(used)
                    .unwrap()
                    .approx_eq(payment.amount()),
                "payment {} not conserved",
                payment.payment_number()
            );
        }
    }
}

/// Store wrapper that fails the atomic reversal write for chosen invoices.
pub struct FailingStore {
    inner: Arc<InMemoryLedgerStore>,
    failing_invoices: Mutex<HashSet<InvoiceId>>,
}

impl FailingStore {
    pub fn new(inner: Arc<InMemoryLedgerStore>) -> Self {
        Self {
            inner,
            failing_invoices: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_writes_for(&self, invoice_id: InvoiceId) {
        self.failing_invoices.lock().unwrap().insert(invoice_id);
    }
}

impl LedgerStore for FailingStore {
    fn allocation(
        &self,
        tenant_id: TenantId,
        id: AllocationId,
    ) -> Result<Option<PaymentAllocation>, StoreError> {
        self.inner.allocation(tenant_id, id)
    }

    fn payment(&self, tenant_id: TenantId, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        self.inner.payment(tenant_id, id)
    }

    fn invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        self.inner.invoice(tenant_id, id)
    }

    fn batch(&self, tenant_id: TenantId, id: BatchId) -> Result<Option<PaymentBatch>, StoreError> {
        self.inner.batch(tenant_id, id)
    }

    fn allocations_for_payment(
        &self,
        tenant_id: TenantId,
        payment_id: PaymentId,
    ) -> Result<Vec<PaymentAllocation>, StoreError> {
        self.inner.allocations_for_payment(tenant_id, payment_id)
    }

    fn allocations_for_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<PaymentAllocation>, StoreError> {
        self.inner.allocations_for_invoice(tenant_id, invoice_id)
    }

    fn commit_reversal(
        &self,
        tenant_id: TenantId,
        write: &ReversalWrite,
    ) -> Result<(), StoreError> {
        if self
            .failing_invoices
            .lock()
            .unwrap()
            .contains(&write.invoice.id_typed())
        {
            return Err(StoreError::Storage(format!(
                "simulated write failure for invoice {}",
                write.invoice.invoice_number()
            )));
        }
        self.inner.commit_reversal(tenant_id, write)
    }

    fn row_locks(&self) -> &LockManager {
        self.inner.row_locks()
    }
}

/// Store wrapper that stalls payment and invoice reads, widening the window
/// between reading a row and writing it back.
pub struct SlowReads {
    inner: Arc<InMemoryLedgerStore>,
    delay: Duration,
}

impl SlowReads {
    pub fn new(inner: Arc<InMemoryLedgerStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl LedgerStore for SlowReads {
    fn allocation(
        &self,
        tenant_id: TenantId,
        id: AllocationId,
    ) -> Result<Option<PaymentAllocation>, StoreError> {
        self.inner.allocation(tenant_id, id)
    }

    fn payment(&self, tenant_id: TenantId, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        thread::sleep(self.delay);
        self.inner.payment(tenant_id, id)
    }

    fn invoice(&self, tenant_id: TenantId, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        thread::sleep(self.delay);
        self.inner.invoice(tenant_id, id)
    }

    fn batch(&self, tenant_id: TenantId, id: BatchId) -> Result<Option<PaymentBatch>, StoreError> {
        self.inner.batch(tenant_id, id)
    }

    fn allocations_for_payment(
        &self,
        tenant_id: TenantId,
        payment_id: PaymentId,
    ) -> Result<Vec<PaymentAllocation>, StoreError> {
        self.inner.allocations_for_payment(tenant_id, payment_id)
    }

    fn allocations_for_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<PaymentAllocation>, StoreError> {
        self.inner.allocations_for_invoice(tenant_id, invoice_id)
    }

    fn commit_reversal(
        &self,
        tenant_id: TenantId,
        write: &ReversalWrite,
    ) -> Result<(), StoreError> {
        self.inner.commit_reversal(tenant_id, write)
    }

    fn row_locks(&self) -> &LockManager {
        self.inner.row_locks()
    }
}
