use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ring::rand::SystemRandom;
use signal_vault::models::access_code::{normalize_code, CODE_ALPHABET, CODE_LENGTH};
use signal_vault::models::{ServiceId, Subscription};
use signal_vault::random::random_string;
use signal_vault::services::ledger::{entitlement_view, SubscriptionMap};

fn benchmark_code_generation(c: &mut Criterion) {
    let rng = SystemRandom::new();

    let mut group = c.benchmark_group("access_codes");

    group.bench_function("generate_code_value", |b| {
        b.iter(|| random_string(&rng, black_box(CODE_ALPHABET), CODE_LENGTH))
    });

    group.bench_function("normalize_user_input", |b| {
        b.iter(|| normalize_code(black_box("  xj4k9qzt ")))
    });

    group.finish();
}

fn benchmark_entitlement_view(c: &mut Criterion) {
    let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

    // Every service subscribed, half of them lapsed at the evaluation time
    let mut subscriptions = SubscriptionMap::new();
    for (i, service) in ServiceId::ALL.into_iter().enumerate() {
        let days = if i % 2 == 0 { 30 } else { 1 };
        subscriptions.insert(service.as_str().to_string(), Subscription::grant(t0, days));
    }
    let as_of = t0 + Duration::days(7);

    c.bench_function("entitlement_view_full_catalog", |b| {
        b.iter(|| entitlement_view(black_box(&subscriptions), black_box(as_of)))
    });
}

criterion_group!(benches, benchmark_code_generation, benchmark_entitlement_view);
criterion_main!(benches);
