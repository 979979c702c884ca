//! Payment ingestion batches.
//!
//! Batches are owned by the ingestion pipeline; the reversal engine only reads
//! them to tell whether a payment's allocations may still be changing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use payrev_core::{AggregateId, AggregateRoot, DomainError, DomainResult, Money, TenantId};

/// Batch identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub AggregateId);

impl BatchId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::CompletedWithErrors | BatchStatus::Failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentBatch {
    id: BatchId,
    tenant_id: TenantId,
    batch_number: String,
    status: BatchStatus,
    receipt_count: u32,
    processed_count: u32,
    failed_count: u32,
    total_amount: Money,
    processing_started_at: Option<DateTime<Utc>>,
    processing_finished_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    version: u64,
}

impl PaymentBatch {
    pub fn new(
        tenant_id: TenantId,
        id: BatchId,
        batch_number: impl Into<String>,
        receipt_count: u32,
        total_amount: Money,
    ) -> Self {
        Self {
            id,
            tenant_id,
            batch_number: batch_number.into(),
            status: BatchStatus::Pending,
            receipt_count,
            processed_count: 0,
            failed_count: 0,
            total_amount,
            processing_started_at: None,
            processing_finished_at: None,
            failure_reason: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> BatchId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn batch_number(&self) -> &str {
        &self.batch_number
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn receipt_count(&self) -> u32 {
        self.receipt_count
    }

    pub fn processed_count(&self) -> u32 {
        self.processed_count
    }

    pub fn failed_count(&self) -> u32 {
        self.failed_count
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn processing_started_at(&self) -> Option<DateTime<Utc>> {
        self.processing_started_at
    }

    pub fn processing_finished_at(&self) -> Option<DateTime<Utc>> {
        self.processing_finished_at
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn can_be_processed(&self) -> bool {
        self.status == BatchStatus::Pending
    }

    pub fn start_processing(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if !self.can_be_processed() {
            return Err(DomainError::conflict(format!(
                "batch {} cannot be processed from status {:?}",
                self.batch_number, self.status
            )));
        }
        self.status = BatchStatus::Processing;
        self.processing_started_at = Some(at);
        self.version += 1;
        Ok(())
    }

    pub fn record_progress(&mut self, processed: u32, failed: u32) -> DomainResult<()> {
        if self.status != BatchStatus::Processing {
            return Err(DomainError::conflict("batch is not processing"));
        }
        if processed.saturating_add(failed) > self.receipt_count {
            return Err(DomainError::invariant(format!(
                "progress {processed}+{failed} exceeds receipt count {}",
                self.receipt_count
            )));
        }
        self.processed_count = processed;
        self.failed_count = failed;
        self.version += 1;
        Ok(())
    }

    /// Finish processing; any failed receipt downgrades to `CompletedWithErrors`.
    pub fn complete(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != BatchStatus::Processing {
            return Err(DomainError::conflict("only a processing batch can complete"));
        }
        self.status = if self.failed_count > 0 {
            BatchStatus::CompletedWithErrors
        } else {
            BatchStatus::Completed
        };
        self.processing_finished_at = Some(at);
        self.version += 1;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "batch {} already finished as {:?}",
                self.batch_number, self.status
            )));
        }
        self.status = BatchStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.processing_finished_at = Some(at);
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for PaymentBatch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
