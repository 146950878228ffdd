use criterion::{black_box, criterion_group, criterion_main, Criterion};
use multiswap_engine::core::config::EngineConfig;
use multiswap_engine::core::snapshot::MarketSnapshot;
use multiswap_engine::core::user::UserId;
use multiswap_engine::graph::cycle_finder::CycleFinder;
use multiswap_engine::graph::want_graph::{OpportunityFilters, WantGraph};
use multiswap_engine::scoring::scorer::CycleScorer;
use multiswap_engine::simulation::market_gen::{generate_random_market, ring_market, MarketConfig};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;

fn search(snap: &MarketSnapshot, user: &UserId, config: &EngineConfig) -> usize {
    let filters = OpportunityFilters::default();
    let graph = WantGraph::build(snap, user, &filters, config, &HashSet::new());
    let outcome = CycleFinder::from_config(config, &filters).find(&graph);
    CycleScorer::from_config(config)
        .score_all(snap, &outcome.cycles, Utc::now())
        .len()
}

fn bench_search_50_users(c: &mut Criterion) {
    let snap = generate_random_market(&MarketConfig {
        user_count: 50,
        ..Default::default()
    });
    let config = EngineConfig::default();
    let user = UserId::new("user-0000");

    c.bench_function("search_50_users", |b| {
        b.iter(|| search(black_box(&snap), &user, &config))
    });
}

fn bench_search_500_users(c: &mut Criterion) {
    let snap = generate_random_market(&MarketConfig {
        user_count: 500,
        items_per_user: 3,
        ..Default::default()
    });
    let config = EngineConfig::default();
    let user = UserId::new("user-0000");

    c.bench_function("search_500_users", |b| {
        b.iter(|| search(black_box(&snap), &user, &config))
    });
}

fn bench_graph_build_2000_users(c: &mut Criterion) {
    let snap = generate_random_market(&MarketConfig {
        user_count: 2000,
        ..Default::default()
    });
    let config = EngineConfig::default();
    let user = UserId::new("user-0000");
    let filters = OpportunityFilters::default();

    c.bench_function("graph_build_2000_users", |b| {
        b.iter(|| WantGraph::build(black_box(&snap), &user, &filters, &config, &HashSet::new()))
    });
}

fn bench_ring_5(c: &mut Criterion) {
    let snap = ring_market(5, Decimal::from(50));
    let config = EngineConfig::default();
    let user = UserId::new("ring-000");

    c.bench_function("ring_5", |b| b.iter(|| search(black_box(&snap), &user, &config)));
}

criterion_group!(
    benches,
    bench_search_50_users,
    bench_search_500_users,
    bench_graph_build_2000_users,
    bench_ring_5
);
criterion_main!(benches);
