use core::hint::black_box;
use core::time::Duration;
use std::collections::BTreeSet;

use criterion::measurement::WallTime;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rbtree::RedBlackTree;

pub fn gen_random_keys(count: usize, key_max: i32) -> Vec<i32> {
    let mut rng = ChaCha8Rng::seed_from_u64(123);
    let keys: Vec<_> = (0..count).map(|_| rng.gen_range(0..key_max)).collect();
    assert_eq!(keys.len(), count);
    keys
}

pub fn gen_ascending_keys(count: usize) -> Vec<i32> {
    (0..count).map(|a| a as i32).collect()
}

pub fn shuffled<T: Clone>(keys: &[T], seed: u64) -> Vec<T> {
    let mut keys = keys.to_vec();
    keys.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    keys
}

fn insert(c: &mut Criterion<WallTime>) {
    let mut g = c.benchmark_group("insert");

    let mut count = 1000;
    for _ in 0..10 {
        for (kind, keys) in [
            ("random", gen_random_keys(count, i32::MAX / 2)),
            ("ascending", gen_ascending_keys(count)),
        ] {
            g.bench_with_input(BenchmarkId::new(format!("rbtree_{kind}"), count), &keys, |b, keys| {
                b.iter(|| {
                    let mut tree = RedBlackTree::new();
                    for &x in keys {
                        tree.insert(x);
                    }
                    tree
                })
            });
            g.bench_with_input(BenchmarkId::new(format!("std_{kind}"), count), &keys, |b, keys| {
                b.iter(|| {
                    let mut set = BTreeSet::new();
                    for &x in keys {
                        set.insert(x);
                    }
                    set
                })
            });
        }
        count *= 2;
    }
}

fn find(c: &mut Criterion<WallTime>) {
    let mut g = c.benchmark_group("find");

    let mut count = 1000;
    for _ in 0..10 {
        let keys = gen_random_keys(count, i32::MAX / 2);
        let access_keys = shuffled(&keys, 321);
        let tree: RedBlackTree<i32> = keys.iter().copied().collect();
        let set: BTreeSet<i32> = keys.iter().copied().collect();

        g.bench_with_input(BenchmarkId::new("rbtree", count), &count, |b, _c| {
            b.iter(|| {
                for k in access_keys.iter() {
                    black_box(tree.find(black_box(k)));
                }
            })
        });
        g.bench_with_input(BenchmarkId::new("std", count), &count, |b, _c| {
            b.iter(|| {
                for k in access_keys.iter() {
                    black_box(set.get(black_box(k)));
                }
            })
        });
        count *= 2;
    }
}

fn erase(c: &mut Criterion<WallTime>) {
    let mut g = c.benchmark_group("erase");

    let mut count = 1000;
    for _ in 0..10 {
        let keys = gen_random_keys(count, i32::MAX / 2);
        let order: Vec<usize> = shuffled(&(0..count).collect::<Vec<_>>(), 456);

        g.bench_with_input(BenchmarkId::new("rbtree", count), &count, |b, _c| {
            b.iter_batched(
                || {
                    let mut tree = RedBlackTree::with_capacity(keys.len());
                    let handles: Vec<_> = keys.iter().map(|&x| tree.insert(x)).collect();
                    (tree, handles)
                },
                |(mut tree, handles)| {
                    for &i in &order {
                        black_box(tree.erase(handles[i]).ok());
                    }
                    tree
                },
                criterion::BatchSize::LargeInput,
            )
        });
        g.bench_with_input(BenchmarkId::new("std", count), &count, |b, _c| {
            b.iter_batched(
                || keys.iter().copied().collect::<BTreeSet<_>>(),
                |mut set| {
                    for &i in &order {
                        black_box(set.remove(&keys[i]));
                    }
                    set
                },
                criterion::BatchSize::LargeInput,
            )
        });
        count *= 2;
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_millis(1000))
        ;
    targets = insert, find, erase
);
criterion_main!(benches);
