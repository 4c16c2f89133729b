// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use understory_sparse_grid::SparseGrid;

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }

    fn gen_range_usize(&mut self, upper_exclusive: usize) -> usize {
        if upper_exclusive == 0 {
            return 0;
        }
        (self.next_u32() as usize) % upper_exclusive
    }
}

fn random_cells(n: usize, rows: usize, cols: usize, seed: u64) -> Vec<(usize, usize)> {
    let mut rng = Lcg::new(seed);
    (0..n)
        .map(|_| (rng.gen_range_usize(rows), rng.gen_range_usize(cols)))
        .collect()
}

fn build_grid(cells: &[(usize, usize)], page_size: usize) -> SparseGrid<u32> {
    let mut grid = SparseGrid::new(page_size);
    for (i, &(r, c)) in cells.iter().enumerate() {
        grid.set(r, c, i as u32);
    }
    grid
}

fn bench_sparse_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("understory_sparse_grid");
    group.sample_size(50);

    for &n in &[1_000_usize, 100_000] {
        let cells = random_cells(n, 100_000, 64, 0x5A4E_0000_0000_0001);

        for &page_size in &[8_usize, 32] {
            group.bench_function(format!("set(n={n},page={page_size})"), |b| {
                b.iter(|| black_box(build_grid(&cells, page_size)));
            });

            let grid = build_grid(&cells, page_size);
            group.bench_function(format!("get(n={n},page={page_size})"), |b| {
                b.iter(|| {
                    let hits = cells.iter().filter(|&&(r, c)| grid.get(r, c).is_some()).count();
                    black_box(hits);
                });
            });

            group.bench_function(format!("remove_all(n={n},page={page_size})"), |b| {
                b.iter_batched(
                    || grid.clone(),
                    |mut grid| {
                        for &(r, c) in &cells {
                            grid.remove(r, c);
                        }
                        black_box(grid);
                    },
                    BatchSize::LargeInput,
                );
            });
        }

        let grid = build_grid(&cells, 32);
        group.bench_function(format!("insert_rows_front(n={n})"), |b| {
            b.iter_batched(
                || grid.clone(),
                |mut grid| {
                    grid.insert_rows(0, 1);
                    black_box(grid);
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("range_1000_rows(n={n})"), |b| {
            b.iter(|| {
                let sum: u64 = grid
                    .range(50_000, 0, 50_999, usize::MAX)
                    .fold(0_u64, |acc, (_, _, v)| acc + u64::from(*v));
                black_box(sum);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sparse_grid);
criterion_main!(benches);
