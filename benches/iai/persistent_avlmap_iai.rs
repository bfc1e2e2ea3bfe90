//! IAI-Callgrind benchmark for PersistentAvlMap core operations.
//!
//! Measures instruction counts for building, querying, removing and
//! iterating. Data sizes: 100, 1000, 10000.

use arbres::persistent::PersistentAvlMap;
use iai_callgrind::{library_benchmark, library_benchmark_group, main};
use std::hint::black_box;

// Setup functions for different data sizes
fn setup_keys_100() -> Vec<i32> {
    (0..100).collect()
}

fn setup_keys_1000() -> Vec<i32> {
    (0..1000).collect()
}

fn setup_keys_10000() -> Vec<i32> {
    (0..10000).collect()
}

fn setup_map_100() -> PersistentAvlMap<i32, i32> {
    (0..100).map(|key| (key, key * 2)).collect()
}

fn setup_map_1000() -> PersistentAvlMap<i32, i32> {
    (0..1000).map(|key| (key, key * 2)).collect()
}

fn setup_map_10000() -> PersistentAvlMap<i32, i32> {
    (0..10000).map(|key| (key, key * 2)).collect()
}

// fold + insert benchmarks
#[library_benchmark]
#[bench::with_setup(setup_keys_100())]
fn fold_insert_100(keys: Vec<i32>) -> PersistentAvlMap<i32, i32> {
    black_box(
        black_box(keys)
            .into_iter()
            .fold(PersistentAvlMap::new(), |accumulator, key| {
                accumulator.insert(black_box(key), black_box(key * 2))
            }),
    )
}

#[library_benchmark]
#[bench::with_setup(setup_keys_1000())]
fn fold_insert_1000(keys: Vec<i32>) -> PersistentAvlMap<i32, i32> {
    black_box(
        black_box(keys)
            .into_iter()
            .fold(PersistentAvlMap::new(), |accumulator, key| {
                accumulator.insert(black_box(key), black_box(key * 2))
            }),
    )
}

#[library_benchmark]
#[bench::with_setup(setup_keys_10000())]
fn fold_insert_10000(keys: Vec<i32>) -> PersistentAvlMap<i32, i32> {
    black_box(
        black_box(keys)
            .into_iter()
            .fold(PersistentAvlMap::new(), |accumulator, key| {
                accumulator.insert(black_box(key), black_box(key * 2))
            }),
    )
}

// get benchmarks
#[library_benchmark]
#[bench::with_setup(setup_map_100())]
fn get_all_100(map: PersistentAvlMap<i32, i32>) -> i32 {
    let mut sum = 0;
    for key in 0..100 {
        if let Some(&value) = map.get(&black_box(key)) {
            sum += value;
        }
    }
    black_box(sum)
}

#[library_benchmark]
#[bench::with_setup(setup_map_1000())]
fn get_all_1000(map: PersistentAvlMap<i32, i32>) -> i32 {
    let mut sum = 0;
    for key in 0..1000 {
        if let Some(&value) = map.get(&black_box(key)) {
            sum += value;
        }
    }
    black_box(sum)
}

#[library_benchmark]
#[bench::with_setup(setup_map_10000())]
fn get_all_10000(map: PersistentAvlMap<i32, i32>) -> i32 {
    let mut sum = 0;
    for key in 0..10000 {
        if let Some(&value) = map.get(&black_box(key)) {
            sum += value;
        }
    }
    black_box(sum)
}

// remove benchmarks
#[library_benchmark]
#[bench::with_setup(setup_map_100())]
fn remove_all_100(map: PersistentAvlMap<i32, i32>) -> PersistentAvlMap<i32, i32> {
    let mut current = map;
    for key in 0..100 {
        current = current.remove(&black_box(key));
    }
    black_box(current)
}

#[library_benchmark]
#[bench::with_setup(setup_map_1000())]
fn remove_all_1000(map: PersistentAvlMap<i32, i32>) -> PersistentAvlMap<i32, i32> {
    let mut current = map;
    for key in 0..1000 {
        current = current.remove(&black_box(key));
    }
    black_box(current)
}

#[library_benchmark]
#[bench::with_setup(setup_map_10000())]
fn remove_all_10000(map: PersistentAvlMap<i32, i32>) -> PersistentAvlMap<i32, i32> {
    let mut current = map;
    for key in 0..10000 {
        current = current.remove(&black_box(key));
    }
    black_box(current)
}

// iteration benchmarks: full drain vs lazy prefix
#[library_benchmark]
#[bench::with_setup(setup_map_1000())]
fn iterate_full_1000(map: PersistentAvlMap<i32, i32>) -> i32 {
    black_box(map.iter().map(|(_, &value)| value).sum())
}

#[library_benchmark]
#[bench::with_setup(setup_map_10000())]
fn iterate_full_10000(map: PersistentAvlMap<i32, i32>) -> i32 {
    black_box(map.iter().map(|(_, &value)| value).sum())
}

#[library_benchmark]
#[bench::with_setup(setup_map_1000())]
fn iterate_prefix_1000(map: PersistentAvlMap<i32, i32>) -> i32 {
    black_box(map.iter().take(10).map(|(_, &value)| value).sum())
}

#[library_benchmark]
#[bench::with_setup(setup_map_10000())]
fn iterate_prefix_10000(map: PersistentAvlMap<i32, i32>) -> i32 {
    black_box(map.iter().take(10).map(|(_, &value)| value).sum())
}

library_benchmark_group!(
    name = persistent_avlmap_group;
    benchmarks =
        fold_insert_100, fold_insert_1000, fold_insert_10000,
        get_all_100, get_all_1000, get_all_10000,
        remove_all_100, remove_all_1000, remove_all_10000,
        iterate_full_1000, iterate_full_10000,
        iterate_prefix_1000, iterate_prefix_10000
);

main!(library_benchmark_groups = persistent_avlmap_group);
