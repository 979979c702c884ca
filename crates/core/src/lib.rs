//! `payrev-core`: shared building blocks for the payment reversal engine.
//!
//! Pure domain primitives only (no storage, no logging setup).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
pub use money::Money;
pub use value_object::ValueObject;
