//! Settlement status derivation.
//!
//! These two functions are the only place that decides whether an invoice is
//! paid or a payment is fully allocated. Statuses are never stored.

use serde::{Deserialize, Serialize};

use payrev_core::Money;

/// How much of an invoice has been settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoicePaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl InvoicePaymentStatus {
    /// Position on the unpaid → paid axis (`Unpaid` = 0).
    pub fn settlement_rank(self) -> u8 {
        match self {
            InvoicePaymentStatus::Unpaid => 0,
            InvoicePaymentStatus::Partial => 1,
            InvoicePaymentStatus::Paid => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvoicePaymentStatus::Unpaid => "unpaid",
            InvoicePaymentStatus::Partial => "partial",
            InvoicePaymentStatus::Paid => "paid",
        }
    }
}

impl core::fmt::Display for InvoicePaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of a payment has been consumed by allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing allocated yet.
    Pending,
    PartiallyAllocated,
    /// Fully allocated.
    Completed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::PartiallyAllocated => "partially_allocated",
            PaymentStatus::Completed => "completed",
        }
    }
}

impl core::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive an invoice's status from its balance.
///
/// `paid` iff `balance_due <= 0.01`; `partial` iff the balance is strictly
/// below `total - 0.01`; `unpaid` otherwise (including balances above total).
pub fn invoice_status(balance_due: Money, total_amount: Money) -> InvoicePaymentStatus {
    if balance_due <= Money::EPSILON {
        return InvoicePaymentStatus::Paid;
    }
    let partial_ceiling = total_amount.minor().saturating_sub(Money::EPSILON.minor());
    if balance_due.minor() < partial_ceiling {
        InvoicePaymentStatus::Partial
    } else {
        InvoicePaymentStatus::Unpaid
    }
}

/// Derive a payment's status from its unallocated remainder.
pub fn payment_status(remaining_amount: Money, amount: Money) -> PaymentStatus {
    if remaining_amount <= Money::EPSILON {
        return PaymentStatus::Completed;
    }
    let pending_floor = amount.minor().saturating_sub(Money::EPSILON.minor());
    if remaining_amount.minor() >= pending_floor {
        PaymentStatus::Pending
    } else {
        PaymentStatus::PartiallyAllocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn invoice_status_boundaries() {
        let total = Money::new(1080, 0);
        assert_eq!(invoice_status(Money::ZERO, total), InvoicePaymentStatus::Paid);
        assert_eq!(invoice_status(Money::from_minor(1), total), InvoicePaymentStatus::Paid);
        assert_eq!(invoice_status(Money::from_minor(2), total), InvoicePaymentStatus::Partial);
        assert_eq!(invoice_status(Money::new(500, 0), total), InvoicePaymentStatus::Partial);
        assert_eq!(
            invoice_status(Money::from_minor(107_998), total),
            InvoicePaymentStatus::Partial
        );
        assert_eq!(
            invoice_status(Money::from_minor(107_999), total),
            InvoicePaymentStatus::Unpaid
        );
        assert_eq!(invoice_status(total, total), InvoicePaymentStatus::Unpaid);
        assert_eq!(
            invoice_status(Money::new(2000, 0), total),
            InvoicePaymentStatus::Unpaid
        );
    }

    #[test]
    fn payment_status_boundaries() {
        let amount = Money::new(1000, 0);
        assert_eq!(payment_status(amount, amount), PaymentStatus::Pending);
        assert_eq!(payment_status(Money::new(400, 0), amount), PaymentStatus::PartiallyAllocated);
        assert_eq!(payment_status(Money::ZERO, amount), PaymentStatus::Completed);
        assert_eq!(payment_status(Money::from_minor(1), amount), PaymentStatus::Completed);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a larger balance never yields a status closer to `paid`.
        #[test]
        fn status_is_monotone_in_balance(
            total in 1i64..10_000_000i64,
            a in 0i64..10_000_000i64,
            extra in 0i64..10_000_000i64,
        ) {
            let total = Money::from_minor(total);
            let lower = invoice_status(Money::from_minor(a), total);
            let higher = invoice_status(Money::from_minor(a + extra), total);
            prop_assert!(higher.settlement_rank() <= lower.settlement_rank());
        }
    }
}
