//! Ledger record types: payments, invoices, the allocations linking them, and
//! the ingestion batches that produce payments.
//!
//! Pure domain logic only: no IO, no locking, no persistence concerns.
//! Balance fields change only through the `release_allocation` methods, and
//! settlement status is always derived from balances via [`status`].

pub mod allocation;
pub mod batch;
pub mod invoice;
pub mod payment;
pub mod status;

pub use allocation::{AllocationId, AllocationState, AllocationStrategy, PaymentAllocation};
pub use batch::{BatchId, BatchStatus, PaymentBatch};
pub use invoice::{Invoice, InvoiceId};
pub use payment::{Payment, PaymentId};
pub use status::{InvoicePaymentStatus, PaymentStatus, invoice_status, payment_status};
