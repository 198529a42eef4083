// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Run with: cargo bench -p contextweave-core --bench render_bench

use contextweave_core::{
    rectify_weights, render, RenderOptions, SnapshotCache, Snapshotter, TokenCalculator,
    VirtualNode,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WORDS: &[&str] = &[
    "trace", "span", "agent", "tool", "call", "result", "memory", "prompt", "context", "budget",
];

/// Random tree of `size` nodes; each node hangs off a random earlier one.
fn random_tree(size: usize, seed: u64) -> VirtualNode {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); size];
    for i in 1..size {
        children[rng.gen_range(0..i)].push(i);
    }

    let mut built: Vec<Option<VirtualNode>> = vec![None; size];
    for i in (0..size).rev() {
        let words = rng.gen_range(1..12);
        let text: Vec<&str> = (0..words)
            .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
            .collect();
        let mut node = VirtualNode::leaf(i as u64, text.join(" "))
            .with_weight(rng.gen_range(0.0..10.0))
            .with_can_merge(rng.gen_bool(0.5));
        for &child in &children[i] {
            if let Some(child) = built[child].take() {
                node.push_child(child, "\n");
            }
        }
        built[i] = Some(node);
    }
    built[0].take().unwrap_or_else(|| VirtualNode::leaf(0, ""))
}

fn bench_snapshot(c: &mut Criterion) {
    let tokens = TokenCalculator::new();
    let mut group = c.benchmark_group("snapshot");

    for size in [100, 1_000, 10_000].iter() {
        let tree = random_tree(*size, 7);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("cold", size), &tree, |b, tree| {
            b.iter(|| Snapshotter::new(&tokens).snapshot(black_box(tree)).unwrap());
        });

        let cache = SnapshotCache::new(*size as u64 * 2);
        let snapshotter = Snapshotter::new(&tokens).cache(&cache);
        snapshotter.snapshot(&tree).unwrap();
        group.bench_with_input(BenchmarkId::new("cached", size), &tree, |b, tree| {
            b.iter(|| snapshotter.snapshot(black_box(tree)).unwrap());
        });
    }

    group.finish();
}

fn bench_rectify(c: &mut Criterion) {
    let tokens = TokenCalculator::new();
    let mut group = c.benchmark_group("rectify");

    for size in [100, 1_000, 10_000].iter() {
        let root = Snapshotter::new(&tokens)
            .snapshot(&random_tree(*size, 11))
            .unwrap();
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &root, |b, root| {
            b.iter(|| rectify_weights(black_box(root), None).unwrap());
        });
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let tokens = TokenCalculator::new();
    let mut group = c.benchmark_group("render");

    for size in [100, 1_000, 10_000].iter() {
        let root = Snapshotter::new(&tokens)
            .snapshot(&random_tree(*size, 13))
            .unwrap();
        let weights = rectify_weights(&root, None).unwrap();
        let budget = root.subtree_cost() / 4.0;
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("estimated", size), &root, |b, root| {
            let options = RenderOptions::new()
                .with_budget(budget)
                .with_weights(&weights);
            b.iter(|| render(black_box(root), &options).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("true_cost", size), &root, |b, root| {
            let options = RenderOptions::new()
                .with_budget(budget)
                .with_weights(&weights)
                .with_true_cost(&tokens);
            b.iter(|| render(black_box(root), &options).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_snapshot, bench_rectify, bench_render);
criterion_main!(benches);
