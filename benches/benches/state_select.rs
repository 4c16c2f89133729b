// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use understory_state_select::{
    AnimationState, LogicOp, StateExpression, StateKey, StateKeyRegistry, StateSelect,
};

struct Bits(u32);

impl AnimationState for Bits {
    fn is_state_active(&self, key: StateKey) -> bool {
        key.id() < 32 && self.0 & (1 << key.id()) != 0
    }
}

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

fn random_expression(rng: &mut Lcg, keys: &[StateKey], depth: u32) -> StateExpression {
    let expr = if depth == 0 || rng.gen_range_usize(3) == 0 {
        StateExpression::check(keys[rng.gen_range_usize(keys.len())])
    } else {
        let op = [LogicOp::And, LogicOp::Or, LogicOp::Xor][rng.gen_range_usize(3)];
        let count = 2 + rng.gen_range_usize(2);
        StateExpression::logic(
            op,
            (0..count).map(|_| random_expression(rng, keys, depth - 1)),
        )
    };
    if rng.next_u32() & 1 == 1 {
        expr.negate()
    } else {
        expr
    }
}

fn build_expressions(num_keys: usize, num_exprs: usize, seed: u64) -> Vec<StateExpression> {
    let mut registry = StateKeyRegistry::new();
    let keys: Vec<_> = (0..num_keys)
        .map(|i| registry.intern(&format!("state{i}")))
        .collect();
    let mut rng = Lcg::new(seed);
    (0..num_exprs)
        .map(|_| random_expression(&mut rng, &keys, 2))
        .collect()
}

fn bench_state_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("understory_state_select");
    group.sample_size(50);

    for &(num_keys, num_exprs) in &[(4_usize, 4_usize), (8, 16), (12, 64)] {
        let expressions = build_expressions(num_keys, num_exprs, 0x5E1E_C700_0000_0001);
        let states: Vec<_> = (0..256_u32)
            .map(|i| Bits(i.wrapping_mul(2_654_435_761) & ((1 << num_keys) - 1)))
            .collect();

        let linear = StateSelect::with_optimizer(expressions.clone(), false);
        group.bench_function(format!("linear(k={num_keys},e={num_exprs})"), |b| {
            b.iter(|| {
                let sum: usize = states.iter().map(|s| linear.evaluate(s)).sum();
                black_box(sum);
            });
        });

        let compiled = StateSelect::with_optimizer(expressions.clone(), true);
        group.bench_function(format!("compiled(k={num_keys},e={num_exprs})"), |b| {
            b.iter(|| {
                let sum: usize = states.iter().map(|s| compiled.evaluate(s)).sum();
                black_box(sum);
            });
        });

        group.bench_function(format!("compile(k={num_keys},e={num_exprs})"), |b| {
            b.iter(|| black_box(StateSelect::with_optimizer(expressions.clone(), true)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_state_select);
criterion_main!(benches);
