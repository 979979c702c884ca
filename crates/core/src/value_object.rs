//! Value object marker.

/// Immutable value compared by its attributes rather than by identity.
///
/// `Money` is the canonical example in this workspace: two amounts of 10.00
/// are interchangeable, two payments of 10.00 are not.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
