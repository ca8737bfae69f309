use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use warden::cache::{PermissionCache, SystemClock};
use warden::matcher;
use warden::resolver::collapse_wildcard;

fn effective_set(n: usize) -> HashSet<String> {
    (0..n).map(|i| format!("resource{}:action{}", i % 32, i)).collect()
}

fn bench_matcher(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher");
    for size in [8usize, 64, 512] {
        let effective = effective_set(size);
        group.bench_with_input(BenchmarkId::new("miss", size), &effective, |b, eff| {
            b.iter(|| matcher::matches("users:read", eff))
        });
        let mut with_wildcard = effective.clone();
        with_wildcard.insert("users:*".to_string());
        group.bench_with_input(BenchmarkId::new("resource_wildcard_hit", size), &with_wildcard, |b, eff| {
            b.iter(|| matcher::matches("users:read", eff))
        });
    }
    group.finish();
}

fn bench_collapse(c: &mut Criterion) {
    let mut base = effective_set(512);
    base.insert("*".to_string());
    c.bench_function("collapse_wildcard_512", |b| {
        b.iter(|| collapse_wildcard(base.clone()))
    });
}

fn bench_cache_hit(c: &mut Criterion) {
    let cache = PermissionCache::new(Duration::from_secs(300), Arc::new(SystemClock));
    cache.insert("u1", effective_set(64));
    c.bench_function("cache_hit_64", |b| b.iter(|| cache.get("u1")));
}

criterion_group!(benches, bench_matcher, bench_collapse, bench_cache_hit);
criterion_main!(benches);
