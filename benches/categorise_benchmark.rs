//! Benchmarks for hostcat lookup and list parsing.
//!
//! Run with: cargo bench
//!
//! Measures:
//! - Graph lookup throughput for mixed hit/miss queries
//! - Scalability with category size
//! - Suffix walk depth
//! - List parsing with format detection
//! - The refinement pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hostcat::converter::parse_auto;
use hostcat::rule::{PatternTable, Refiner, RuleEngine};
use hostcat::CategoryGraph;

/// Build a graph of `categories` categories holding `hosts_per_category` hosts each.
fn generate_graph(categories: usize, hosts_per_category: usize) -> CategoryGraph {
    let mut graph = CategoryGraph::new();
    for c in 0..categories {
        let hosts = (0..hosts_per_category)
            .map(|i| format!("host{}.cat{}.example.com", i, c))
            .collect();
        graph.insert(&format!("category{}", c), hosts);
    }
    graph
}

/// Mix of subdomain hits and misses.
fn generate_queries(count: usize, hit_ratio: f64, categories: usize) -> Vec<String> {
    let hits = (count as f64 * hit_ratio) as usize;
    let mut queries = Vec::with_capacity(count);
    for i in 0..hits {
        queries.push(format!("sub.host{}.cat{}.example.com", i % 1000, i % categories));
    }
    for i in hits..count {
        queries.push(format!("unknown{}.nonexistent.org", i));
    }
    queries
}

fn bench_categorise_host(c: &mut Criterion) {
    let graph = generate_graph(10, 5_000);
    let queries = generate_queries(1000, 0.8, 10);

    let mut group = c.benchmark_group("categorise_host");
    group.throughput(Throughput::Elements(queries.len() as u64));

    group.bench_function("mixed_queries", |b| {
        b.iter(|| {
            for query in &queries {
                black_box(graph.categorise_host(query));
            }
        })
    });

    group.finish();
}

fn bench_scalability(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalability");

    for size in [100, 1_000, 10_000, 50_000].iter() {
        let graph = generate_graph(5, *size);

        group.throughput(Throughput::Elements(100));
        group.bench_with_input(BenchmarkId::new("hosts_per_category", size), size, |b, _| {
            let queries: Vec<_> = (0..100)
                .map(|i| format!("host{}.cat{}.example.com", i % size, i % 5))
                .collect();
            b.iter(|| {
                for query in &queries {
                    black_box(graph.categorise_host(query));
                }
            })
        });
    }

    group.finish();
}

fn bench_suffix_walk(c: &mut Criterion) {
    let mut graph = CategoryGraph::new();
    graph.insert(
        "video",
        vec!["google.com".to_string(), "youtube.com".to_string()],
    );

    let mut group = c.benchmark_group("suffix_walk");

    group.bench_function("deep_subdomain", |b| {
        b.iter(|| black_box(graph.categorise_host("a.b.c.d.e.f.google.com")))
    });

    group.bench_function("exact", |b| {
        b.iter(|| black_box(graph.categorise_host("google.com")))
    });

    // Worst case: every suffix looked up
    group.bench_function("no_match", |b| {
        b.iter(|| black_box(graph.categorise_host("a.b.c.example.org")))
    });

    group.finish();
}

fn bench_parse_lists(c: &mut Criterion) {
    let hosts: String = (0..10_000)
        .map(|i| format!("0.0.0.0 host{}.example.com\n", i))
        .collect();
    let ublock: String = (0..10_000)
        .map(|i| format!("||host{}.example.com^$third-party\n", i))
        .collect();

    let mut group = c.benchmark_group("parse_lists");
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("hosts_10k", |b| b.iter(|| black_box(parse_auto(&hosts))));
    group.bench_function("ublock_10k", |b| b.iter(|| black_box(parse_auto(&ublock))));

    group.finish();
}

fn bench_refine(c: &mut Criterion) {
    let patterns = PatternTable::parse("# Source: video\n/watch\\?v=\n/embed/\n");
    let refiner = Refiner::new().with_rules(RuleEngine::new(&[]), patterns);
    let categories = vec!["adult".to_string(), "video".to_string()];

    let mut group = c.benchmark_group("refine");

    group.bench_function("youtube_watch", |b| {
        b.iter(|| {
            black_box(refiner.refine(
                "youtube.com",
                "https://youtube.com/watch?v=abc",
                categories.clone(),
            ))
        })
    });

    group.bench_function("no_rule", |b| {
        b.iter(|| black_box(refiner.refine("example.com", "https://example.com/", categories.clone())))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_categorise_host,
    bench_scalability,
    bench_suffix_walk,
    bench_parse_lists,
    bench_refine,
);

criterion_main!(benches);
