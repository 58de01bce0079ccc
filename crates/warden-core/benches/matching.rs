//! Benchmarks the radix rule tree against a representative rule set size
//! and a mix of blocked/allowed URLs, to catch matching-hot-path regressions.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use warden_core::tree::RuleTree;

fn build_tree(n: usize) -> RuleTree<u32> {
    let mut tree = RuleTree::new();
    for i in 0..n {
        let pattern = format!("||ad-network-{i}.example.com^");
        tree.insert(&pattern, i as u32);
    }
    tree.insert("/banner/*img", n as u32);
    tree.insert("|https://ads.example.org/", (n + 1) as u32);
    tree
}

fn bench_domain_hit(c: &mut Criterion) {
    let tree = build_tree(20_000);
    let url = "https://ad-network-10000.example.com/pixel.gif";
    c.bench_function("domain_anchored_hit", |b| {
        b.iter(|| black_box(tree.find(black_box(url))))
    });
}

fn bench_miss(c: &mut Criterion) {
    let tree = build_tree(20_000);
    let url = "https://not-in-any-list.example.net/index.html";
    c.bench_function("full_miss", |b| {
        b.iter(|| black_box(tree.find(black_box(url))))
    });
}

fn bench_floating_wildcard(c: &mut Criterion) {
    let tree = build_tree(20_000);
    let url = "https://cdn.example.com/assets/banner/xxxximg.png";
    c.bench_function("floating_wildcard_hit", |b| {
        b.iter(|| black_box(tree.find(black_box(url))))
    });
}

criterion_group!(benches, bench_domain_hit, bench_miss, bench_floating_wildcard);
criterion_main!(benches);
