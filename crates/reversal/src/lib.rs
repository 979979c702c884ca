//! Payment allocation reversal engine.
//!
//! Two entry points, both tenant-scoped:
//!
//! - [`ImpactAnalyzer::analyze`]: read-only preview of what reversing a set
//!   of allocations would do to every affected invoice and payment.
//! - [`ReversalExecutor::reverse`]: commits reversals one allocation at a
//!   time under per-row locks and reports an outcome per allocation.
//!
//! [`ReversalService`] bundles both with the supporting operations
//! (pre-validation, history, reverse-by-payment / reverse-by-invoice).
//!
//! ```text
//! ids ──► analyze ──► ImpactReport ──► (operator confirms) ──► reverse ──► ReversalResult
//! ```

pub mod analyzer;
pub mod error;
pub mod executor;
pub mod history;
pub mod report;
pub mod service;
pub mod validation;

pub use analyzer::ImpactAnalyzer;
pub use error::ReversalError;
pub use executor::{CancelToken, ReversalExecutor};
pub use history::ReversalHistoryEntry;
pub use report::{
    ImpactReport, ImpactWarning, InvoiceImpact, ItemResult, PaymentImpact, ReversalOutcome,
    ReversalResult,
};
pub use service::ReversalService;
pub use validation::{ReversibleAllocation, ValidationIssue, ValidationReport};
