//! Performance benchmarks for the authorization path
//!
//! Measures tool filtering over the catalog, role resolution from claims and
//! cached versus uncached policy checks.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bookmarket_mcp::auth::{
    CheckTuple, ClaimsResolver, PolicyBackend, UpstreamError, WarrantWrite, permissions, roles,
};
use bookmarket_mcp::{
    AccessGate, CATALOG, CacheProvider, Claims, InMemoryCache, NoopCache, PermissionMapper,
    PolicyClient, Principal, RoleResolver, ToolAuthorizer,
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;

/// Backend that authorizes everything without I/O
struct AllowAll;

#[async_trait]
impl PolicyBackend for AllowAll {
    async fn check(&self, tuples: &[CheckTuple]) -> Result<Vec<bool>, UpstreamError> {
        Ok(vec![true; tuples.len()])
    }

    async fn write(&self, _writes: &[WarrantWrite]) -> Result<(), UpstreamError> {
        Ok(())
    }
}

fn subscriber() -> Principal {
    Principal::new("user_bench")
        .with_role(roles::SUBSCRIBER)
        .with_permissions([
            permissions::BOOKMARKS_READ,
            permissions::BOOKMARKS_WRITE,
            permissions::BOOKMARKS_DELETE,
            permissions::LISTS_READ,
            permissions::LISTS_WRITE,
            permissions::LISTS_DELETE,
            permissions::TAGS_READ,
            permissions::TAGS_WRITE,
        ])
}

fn free_tier() -> Principal {
    Principal::new("user_free")
        .with_role(roles::FREE_TIER)
        .with_permissions([
            permissions::BOOKMARKS_READ,
            permissions::LISTS_READ,
            permissions::TAGS_READ,
        ])
}

fn authorizer(cache: Arc<dyn CacheProvider>) -> ToolAuthorizer {
    let policy = PolicyClient::new(
        Some(Arc::new(AllowAll)),
        cache,
        Duration::from_secs(300),
        true,
    );
    ToolAuthorizer::new(AccessGate::enabled(), Arc::new(policy))
}

fn bench_gate(c: &mut Criterion) {
    let mut group = c.benchmark_group("access_gate");
    group.throughput(Throughput::Elements(CATALOG.len() as u64));

    let gate = AccessGate::enabled();
    for (name, principal) in [("subscriber", subscriber()), ("free_tier", free_tier())] {
        group.bench_with_input(BenchmarkId::new("filter_catalog", name), &principal, |b, p| {
            b.iter(|| {
                let visible = CATALOG
                    .iter()
                    .filter(|tool| gate.should_expose(tool, Some(p)))
                    .count();
                black_box(visible)
            });
        });
    }

    group.bench_function("anonymous", |b| {
        b.iter(|| {
            let visible = CATALOG
                .iter()
                .filter(|tool| gate.should_expose(tool, None))
                .count();
            black_box(visible)
        });
    });

    group.finish();
}

fn bench_role_resolution(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("role_resolution");

    let resolver = ClaimsResolver::new(Arc::new(PermissionMapper::default()));
    let mut claims = Claims::for_subject("user_bench");
    claims.role = Some(roles::SUBSCRIBER.to_string());

    group.bench_function("claims_role_lookup", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(resolver.resolve(&claims).await) });
    });

    group.finish();
}

fn bench_visible_tools(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("visible_tools");
    let principal = subscriber();

    // Warm cache: every decision after the first iteration is a hit
    let cached = authorizer(Arc::new(InMemoryCache::new()));
    rt.block_on(async {
        cached.visible_tools(&CATALOG, Some(&principal)).await;
    });
    group.bench_function("policy_cached", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(cached.visible_tools(&CATALOG, Some(&principal)).await.len())
        });
    });

    // No cache: every call is a batch round trip to the backend
    let uncached = authorizer(Arc::new(NoopCache::new()));
    group.bench_function("policy_uncached", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(uncached.visible_tools(&CATALOG, Some(&principal)).await.len())
        });
    });

    let gate_only = ToolAuthorizer::new(
        AccessGate::enabled(),
        Arc::new(PolicyClient::unconfigured(Arc::new(NoopCache::new()))),
    );
    group.bench_function("gate_only", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(gate_only.visible_tools(&CATALOG, Some(&principal)).await.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_gate, bench_role_resolution, bench_visible_tools);
criterion_main!(benches);
