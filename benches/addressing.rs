// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for range addressing.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rangekv::kv::{Db, LocalKv};
use rangekv::storage::{
    lookup_range, split_range_addressing, MemMvccStore, RangeDescriptor, RangeId, WriteBatch,
    KEY_MAX, KEY_MIN,
};
use rangekv::time::{HlcClock, Timestamp};
use std::sync::Arc;

fn bench_split_addressing(c: &mut Criterion) {
    let whole = RangeDescriptor::new(RangeId(1), KEY_MIN, KEY_MAX);
    let left = RangeDescriptor::new(RangeId(1), KEY_MIN, "m");
    let right = RangeDescriptor::new(RangeId(2), "m", KEY_MAX);

    c.bench_function("addressing::split", |b| {
        b.iter_batched(
            WriteBatch::new,
            |mut batch| {
                split_range_addressing(&mut batch, &whole, &left, &right).unwrap();
                black_box(batch)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_lookup(c: &mut Criterion) {
    let store = Arc::new(MemMvccStore::new());
    let clock = Arc::new(HlcClock::default());
    let kv = LocalKv::new(store.clone(), clock.clone()).unwrap();
    let db = Db::new(Arc::new(kv), clock);
    let rt = tokio::runtime::Runtime::new().unwrap();

    // 100 ranges
    rt.block_on(async {
        for i in 1..100 {
            db.split_range(format!("user{:03}", i)).await.unwrap();
        }
    });

    let mut i = 0u64;
    c.bench_function("addressing::lookup_100_ranges", |b| {
        b.iter(|| {
            i += 1;
            let key = format!("user{:03}x", i % 100);
            black_box(lookup_range(&*store, key.as_bytes(), &Timestamp::MAX).unwrap())
        })
    });
}

criterion_group!(benches, bench_split_addressing, bench_lookup);
criterion_main!(benches);
