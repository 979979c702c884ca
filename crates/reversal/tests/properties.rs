mod common;

use payrev_core::{Money, UserId};
use payrev_ledger::{AllocationId, InvoiceId};
use payrev_reversal::ReversalOutcome;
use proptest::prelude::*;

use common::Books;

/// Up to three invoices settled by one payment. Each allocation is
/// `(amount_cents, invoice_index, selected_for_reversal)`.
fn plan() -> impl Strategy<Value = (Vec<(i64, usize, bool)>, [i64; 3], i64)> {
    (
        prop::collection::vec((1i64..250_000, 0usize..3, any::<bool>()), 1..10),
        prop::array::uniform3(0i64..5_000),
        0i64..10_000,
    )
}

struct Seeded {
    books: Books,
    invoices: Vec<InvoiceId>,
    allocations: Vec<AllocationId>,
    selected: Vec<AllocationId>,
}

fn seed(allocations: &[(i64, usize, bool)], invoice_slack: [i64; 3], payment_slack: i64) -> Seeded {
    let books = Books::new();

    let mut invoice_totals = invoice_slack;
    for &(cents, index, _) in allocations {
        invoice_totals[index] += cents;
    }
    let invoices: Vec<InvoiceId> = invoice_totals
        .iter()
        .enumerate()
        .map(|(i, &cents)| books.invoice(&format!("INV-{i}"), Money::from_minor(cents.max(1))))
        .collect();

    let payment_total: i64 = allocations.iter().map(|(c, _, _)| c).sum::<i64>() + payment_slack;
    let payment = books.payment("PAY-P", Money::from_minor(payment_total));

    let mut ids = Vec::new();
    let mut selected = Vec::new();
    for &(cents, index, reverse) in allocations {
        let id = books.allocate(payment, invoices[index], Money::from_minor(cents));
        ids.push(id);
        if reverse {
            selected.push(id);
        }
    }

    Seeded {
        books,
        invoices,
        allocations: ids,
        selected,
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Balances stay equal to total minus active allocations after any reversal.
    #[test]
    fn conservation_holds_after_reversal((allocs, inv_slack, pay_slack) in plan()) {
        let seeded = seed(&allocs, inv_slack, pay_slack);
        seeded.books.assert_conserved();
        prop_assume!(!seeded.selected.is_empty());

        seeded
            .books
            .service()
            .reverse_allocations(seeded.books.tenant, &seeded.selected, "prop", UserId::new())
            .unwrap();

        seeded.books.assert_conserved();
    }

    /// The preview is exactly what execution commits.
    #[test]
    fn analysis_agrees_with_execution((allocs, inv_slack, pay_slack) in plan()) {
        let seeded = seed(&allocs, inv_slack, pay_slack);
        prop_assume!(!seeded.selected.is_empty());
        let service = seeded.books.service();

        let report = service
            .analyze_reversal_impact(seeded.books.tenant, &seeded.selected)
            .unwrap();
        service
            .reverse_allocations(seeded.books.tenant, &seeded.selected, "prop", UserId::new())
            .unwrap();

        for impact in &report.invoices {
            let state = seeded.books.invoice_state(impact.invoice_id);
            prop_assert_eq!(state.balance_due(), impact.projected_balance);
            prop_assert_eq!(state.status(), impact.projected_status);
        }
        for impact in &report.payments {
            let state = seeded.books.payment_state(impact.payment_id);
            prop_assert_eq!(state.remaining_amount(), impact.projected_remaining);
            prop_assert_eq!(state.status(), impact.projected_status);
        }
    }

    /// Reversal never lowers a balance and never moves status toward paid.
    #[test]
    fn reversal_only_moves_invoices_away_from_paid((allocs, inv_slack, pay_slack) in plan()) {
        let seeded = seed(&allocs, inv_slack, pay_slack);
        prop_assume!(!seeded.selected.is_empty());
        let before: Vec<_> = seeded
            .invoices
            .iter()
            .map(|id| seeded.books.invoice_state(*id))
            .collect();

        seeded
            .books
            .service()
            .reverse_allocations(seeded.books.tenant, &seeded.selected, "prop", UserId::new())
            .unwrap();

        for old in before {
            let new = seeded.books.invoice_state(old.id_typed());
            prop_assert!(new.balance_due() >= old.balance_due());
            prop_assert!(new.status().settlement_rank() <= old.status().settlement_rank());
        }
    }

    /// A repeated call reports every id as already reversed and changes nothing.
    #[test]
    fn second_reversal_is_a_no_op((allocs, inv_slack, pay_slack) in plan()) {
        let seeded = seed(&allocs, inv_slack, pay_slack);
        let service = seeded.books.service();
        let ids = &seeded.allocations;

        service.reverse_allocations(seeded.books.tenant, ids, "prop", UserId::new()).unwrap();
        let invoices = seeded.books.store.list_invoices(seeded.books.tenant).unwrap();
        let payments = seeded.books.store.list_payments(seeded.books.tenant).unwrap();

        let second = service
            .reverse_allocations(seeded.books.tenant, ids, "prop", UserId::new())
            .unwrap();

        prop_assert!(second.outcomes().iter().all(|o| *o == ReversalOutcome::AlreadyReversed));
        prop_assert_eq!(second.total_processed, ids.len());
        for invoice in invoices {
            prop_assert_eq!(seeded.books.invoice_state(invoice.id_typed()), invoice);
        }
        for payment in payments {
            prop_assert_eq!(seeded.books.payment_state(payment.id_typed()), payment);
        }
    }
}
