//! Lease list and route collection benchmarks

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use ipnet::Ipv4Net;
use rnext::{EphemeralRoutes, Lease, Route, RouteTable, Routes};
use std::hint::black_box;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::Instant;

fn host(i: u32) -> Ipv4Net {
    Ipv4Net::new(Ipv4Addr::from(0x0a08_0000 + i), 32).unwrap()
}

/// Routes with scattered network addresses so sorting has work to do
fn scattered_routes(count: u32) -> Routes<u32> {
    (0..count)
        .map(|i| {
            let addr = Ipv4Addr::from(i.wrapping_mul(2_654_435_761) & 0xffff_ff00);
            Route::from_prefix(Ipv4Net::new(addr, 24).unwrap(), i)
        })
        .collect()
}

fn lease_insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("lease_insert");
    let base = Instant::now();

    for size in [16u32, 256, 1024] {
        // Reverse expiry order is the worst case for the linear scan
        group.bench_with_input(BenchmarkId::new("add_reverse_order", size), &size, |b, &size| {
            b.iter(|| {
                let mut leases = EphemeralRoutes::new();
                for i in (0..size).rev() {
                    let expires = base + Duration::from_secs(u64::from(i));
                    leases.add(Lease::from_prefix(host(i), expires, i));
                }
                black_box(leases);
            });
        });
    }

    group.finish();
}

fn route_match_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_match");

    for size in [16u32, 256, 1024] {
        let routes = scattered_routes(size);
        let miss = host(0xffff);
        group.bench_with_input(BenchmarkId::new("match_miss", size), &routes, |b, routes| {
            b.iter(|| {
                black_box(routes.matches(black_box(&miss)));
            });
        });
    }

    group.bench_function("sort_1024", |b| {
        let routes = scattered_routes(1024);
        b.iter_batched(
            || routes.clone(),
            |mut routes| {
                routes.sort();
                black_box(routes);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn lease_allocation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("lease_allocation");
    let gateway: Ipv4Net = "10.8.0.1/24".parse().unwrap();

    group.bench_function("fill_slash24", |b| {
        b.iter(|| {
            let mut table = RouteTable::new(gateway, Duration::from_secs(3600));
            let now = Instant::now();
            while table.allocate(now, ()).is_ok() {}
            black_box(table.leases().len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    lease_insert_benchmark,
    route_match_benchmark,
    lease_allocation_benchmark
);
criterion_main!(benches);
