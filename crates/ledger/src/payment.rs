use serde::{Deserialize, Serialize};

use payrev_core::{AggregateId, AggregateRoot, DomainError, DomainResult, Money, TenantId};

use crate::batch::BatchId;
use crate::status::{PaymentStatus, payment_status};

/// Payment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub AggregateId);

impl PaymentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Received payment.
///
/// Invariant: `0 <= remaining_amount <= amount`, where
/// `remaining_amount = amount - Σ active allocations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    tenant_id: TenantId,
    payment_number: String,
    amount: Money,
    remaining_amount: Money,
    batch_id: Option<BatchId>,
    version: u64,
}

impl Payment {
    /// A newly recorded payment, fully unallocated.
    pub fn record(
        tenant_id: TenantId,
        id: PaymentId,
        payment_number: impl Into<String>,
        amount: Money,
        batch_id: Option<BatchId>,
    ) -> DomainResult<Self> {
        if !amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        Ok(Self {
            id,
            tenant_id,
            payment_number: payment_number.into(),
            amount,
            remaining_amount: amount,
            batch_id,
            version: 0,
        })
    }

    /// Rehydrate a persisted payment.
    pub fn restore(
        tenant_id: TenantId,
        id: PaymentId,
        payment_number: impl Into<String>,
        amount: Money,
        remaining_amount: Money,
        batch_id: Option<BatchId>,
        version: u64,
    ) -> Self {
        Self {
            id,
            tenant_id,
            payment_number: payment_number.into(),
            amount,
            remaining_amount,
            batch_id,
            version,
        }
    }

    pub fn id_typed(&self) -> PaymentId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn payment_number(&self) -> &str {
        &self.payment_number
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn remaining_amount(&self) -> Money {
        self.remaining_amount
    }

    pub fn batch_id(&self) -> Option<BatchId> {
        self.batch_id
    }

    /// Amount consumed by active allocations.
    pub fn allocated_total(&self) -> DomainResult<Money> {
        self.amount.checked_sub(self.remaining_amount)
    }

    pub fn status(&self) -> PaymentStatus {
        payment_status(self.remaining_amount, self.amount)
    }

    /// Reversal path: free `amount` of capacity.
    ///
    /// Refuses to push the allocated total below zero; that would mean the
    /// allocations on record exceed what was ever received.
    pub fn release_allocation(&mut self, amount: Money) -> DomainResult<()> {
        if !amount.is_positive() {
            return Err(DomainError::validation("released amount must be positive"));
        }
        let remaining = self.remaining_amount.checked_add(amount)?;
        if remaining > self.amount {
            return Err(DomainError::invariant(format!(
                "releasing {amount} would leave payment {} with remaining {remaining} above its amount {}",
                self.payment_number, self.amount
            )));
        }
        self.remaining_amount = remaining;
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
