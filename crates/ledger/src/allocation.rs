use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use payrev_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, Money, TenantId, UserId,
};

use crate::invoice::InvoiceId;
use crate::payment::PaymentId;

/// Allocation identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationId(pub AggregateId);

impl AllocationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AllocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// How the allocation was originally made (informational only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStrategy {
    Manual,
    Automatic,
}

/// Lifecycle of an allocation. `Reversed` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AllocationState {
    Active,
    Reversed {
        at: DateTime<Utc>,
        reason: String,
        by: UserId,
    },
}

/// Link between one payment and one invoice for a fixed amount.
///
/// Rows are never deleted: reversal is a one-way state change that keeps the
/// original amount for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    id: AllocationId,
    tenant_id: TenantId,
    payment_id: PaymentId,
    invoice_id: InvoiceId,
    allocated_amount: Money,
    allocation_date: DateTime<Utc>,
    strategy: AllocationStrategy,
    state: AllocationState,
    version: u64,
}

impl PaymentAllocation {
    /// An active allocation as persisted by the forward-allocation path.
    pub fn new(
        tenant_id: TenantId,
        id: AllocationId,
        payment_id: PaymentId,
        invoice_id: InvoiceId,
        allocated_amount: Money,
        allocation_date: DateTime<Utc>,
        strategy: AllocationStrategy,
    ) -> DomainResult<Self> {
        if !allocated_amount.is_positive() {
            return Err(DomainError::validation("allocated amount must be positive"));
        }
        Ok(Self {
            id,
            tenant_id,
            payment_id,
            invoice_id,
            allocated_amount,
            allocation_date,
            strategy,
            state: AllocationState::Active,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> AllocationId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn payment_id(&self) -> PaymentId {
        self.payment_id
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    pub fn allocated_amount(&self) -> Money {
        self.allocated_amount
    }

    pub fn allocation_date(&self) -> DateTime<Utc> {
        self.allocation_date
    }

    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    pub fn state(&self) -> &AllocationState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, AllocationState::Active)
    }

    pub fn reversed_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            AllocationState::Active => None,
            AllocationState::Reversed { at, .. } => Some(*at),
        }
    }

    pub fn reversal_reason(&self) -> Option<&str> {
        match &self.state {
            AllocationState::Active => None,
            AllocationState::Reversed { reason, .. } => Some(reason),
        }
    }

    pub fn reversed_by(&self) -> Option<UserId> {
        match &self.state {
            AllocationState::Active => None,
            AllocationState::Reversed { by, .. } => Some(*by),
        }
    }

    /// Move to the terminal `Reversed` state.
    pub fn reverse(
        &mut self,
        at: DateTime<Utc>,
        reason: impl Into<String>,
        by: UserId,
    ) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::conflict(format!(
                "allocation {} is already reversed",
                self.id
            )));
        }
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(DomainError::validation("reversal reason is required"));
        }
        self.state = AllocationState::Reversed { at, reason, by };
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for PaymentAllocation {
    type Id = AllocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
