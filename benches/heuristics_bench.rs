use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cozy_chess::Color;
use pvpilot::search::budget::{calc_nodes, set_nodes, NodeBudget};
use pvpilot::search::heuristics::{promising, prune_margin};
use pvpilot::search::timeman::{Clock, TimeManager};

fn bench_prune_margin(c: &mut Criterion) {
    c.bench_function("prune_margin_sweep", |b| {
        b.iter(|| {
            let mut acc = 0i64;
            for best in [-300, -50, 0, 50, 300] {
                for i in 1..30u32 {
                    acc += i64::from(prune_margin(black_box(best), i));
                }
            }
            acc
        })
    });
}

fn bench_calc_nodes(c: &mut Criterion) {
    c.bench_function("calc_nodes_pass", |b| {
        b.iter(|| {
            let mut acc = 0u64;
            for idx in 0..40u32 {
                let promise = promising(black_box(idx as i32 - 20), 30, 40, 8, idx == 0);
                acc += calc_nodes(
                    black_box(250_000.0),
                    30,
                    Some(idx as i32 - 20),
                    8,
                    idx == 0,
                    1.0,
                    promise,
                );
            }
            acc
        })
    });
}

fn bench_set_nodes(c: &mut Criterion) {
    c.bench_function("set_nodes_auto", |b| {
        b.iter(|| {
            let mut acc = 0.0f64;
            for i in 1..64u32 {
                acc += set_nodes(
                    black_box(NodeBudget::Automatic { scale: 1.0 }),
                    i,
                    1_500_000.0,
                    4,
                );
            }
            acc
        })
    });
}

fn bench_timeman_init(c: &mut Criterion) {
    let clock = Clock::new(180_000, 120_000, 2_000, 2_000);
    c.bench_function("timeman_init", |b| {
        b.iter(|| TimeManager::init(black_box(&clock), Color::White, black_box(42), 100))
    });
}

criterion_group!(benches, bench_prune_margin, bench_calc_nodes, bench_set_nodes, bench_timeman_init);
criterion_main!(benches);
