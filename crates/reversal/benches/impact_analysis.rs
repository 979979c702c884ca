use std::sync::Arc;

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use payrev_core::{AggregateId, Money, TenantId, UserId};
use payrev_infra::{EngineConfig, FixedClock, InMemoryAuditSink, InMemoryLedgerStore};
use payrev_ledger::{
    AllocationId, AllocationStrategy, Invoice, InvoiceId, Payment, PaymentAllocation, PaymentId,
};
use payrev_reversal::{ImpactAnalyzer, ReversalExecutor};

/// `allocations` allocations of 10.00 spread over `allocations / 4` invoices
/// and `allocations / 8` payments, all fully settled.
fn seed(allocations: usize) -> (TenantId, Arc<InMemoryLedgerStore>, Vec<AllocationId>) {
    let tenant = TenantId::new();
    let store = Arc::new(InMemoryLedgerStore::new());
    let invoice_count = (allocations / 4).max(1);
    let payment_count = (allocations / 8).max(1);
    let unit = Money::new(10, 0);

    let invoices: Vec<InvoiceId> = (0..invoice_count)
        .map(|_| InvoiceId::new(AggregateId::new()))
        .collect();
    let payments: Vec<PaymentId> = (0..payment_count)
        .map(|_| PaymentId::new(AggregateId::new()))
        .collect();

    let mut per_invoice = vec![0i64; invoice_count];
    let mut per_payment = vec![0i64; payment_count];
    let mut ids = Vec::with_capacity(allocations);
    for i in 0..allocations {
        let (inv, pay) = (i % invoice_count, i % payment_count);
        per_invoice[inv] += unit.minor();
        per_payment[pay] += unit.minor();
        let id = AllocationId::new(AggregateId::new());
        store
            .put_allocation(
                PaymentAllocation::new(
                    tenant,
                    id,
                    payments[pay],
                    invoices[inv],
                    unit,
                    Utc::now(),
                    AllocationStrategy::Automatic,
                )
                .unwrap(),
            )
            .unwrap();
        ids.push(id);
    }
    for (i, id) in invoices.iter().enumerate() {
        let total = Money::from_minor(per_invoice[i]);
        store
            .put_invoice(Invoice::restore(
                tenant,
                *id,
                format!("INV-{i}"),
                total,
                Money::ZERO,
                false,
                0,
            ))
            .unwrap();
    }
    for (i, id) in payments.iter().enumerate() {
        let total = Money::from_minor(per_payment[i]);
        store
            .put_payment(Payment::restore(
                tenant,
                *id,
                format!("PAY-{i}"),
                total,
                Money::ZERO,
                None,
                0,
            ))
            .unwrap();
    }

    (tenant, store, ids)
}

fn bench_impact_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("impact_analysis");

    for size in [16usize, 256, 4096] {
        let (tenant, store, ids) = seed(size);
        let analyzer = ImpactAnalyzer::new(store);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| black_box(analyzer.analyze(tenant, black_box(ids)).unwrap()));
        });
    }

    group.finish();
}

fn bench_reversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverse_allocations");
    group.sample_size(20);

    for size in [16usize, 256] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter_batched(
                || seed(size),
                |(tenant, store, ids)| {
                    let executor = ReversalExecutor::new(
                        store,
                        InMemoryAuditSink::new(),
                        FixedClock::new(Utc::now()),
                        EngineConfig::default(),
                    );
                    black_box(
                        executor
                            .reverse(tenant, &ids, "benchmark", UserId::new())
                            .unwrap(),
                    )
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_impact_analysis, bench_reversal);
criterion_main!(benches);
