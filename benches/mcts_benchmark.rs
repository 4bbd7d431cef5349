#[macro_use]
extern crate criterion;

use std::time::Duration;

use cpomcp::config::SearchParams;
use cpomcp::domains::RockSample;
use cpomcp::mcts::Mcts;
use cpomcp::simulator::Simulator;
use criterion::{black_box, BenchmarkId, Criterion};

fn bench_select_action(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_action");
    group.measurement_time(Duration::from_secs(10));

    for &sims in &[64usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("num_simulations", sims), &sims, |b, &sims| {
            b.iter(|| {
                let sim = RockSample::new(5, 5, 7);
                let params = SearchParams::default().with_num_simulations(sims).with_num_start_states(50);
                let mut planner = Mcts::new(sim, params).unwrap();
                black_box(planner.select_action().unwrap())
            })
        });
    }

    for &rocks in &[5usize, 7, 8] {
        let size = if rocks == 8 { 7 } else { 5 };
        group.bench_with_input(BenchmarkId::new("num_rocks", rocks), &rocks, |b, &_| {
            b.iter(|| {
                let sim = RockSample::new(size, rocks, 7);
                let params = SearchParams::default().with_num_simulations(256).with_num_start_states(50);
                let mut planner = Mcts::new(sim, params).unwrap();
                black_box(planner.select_action().unwrap())
            })
        });
    }

    group.finish();
}

/// Repeated `select_action`/`update` across a full episode, to catch regressions in the cost
/// of committing to the subtree the search already grew versus throwing the whole tree away.
fn bench_episode(c: &mut Criterion) {
    let mut group = c.benchmark_group("episode");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("rocksample_5x5_20_steps", |b| {
        b.iter(|| {
            let real = RockSample::new(5, 5, 42);
            let sim = RockSample::new(5, 5, 7);
            let params = SearchParams::default()
                .with_num_simulations(256)
                .with_num_start_states(50)
                .with_admissible_cost(3.0);
            let mut planner = Mcts::new(sim, params).unwrap();
            let mut state = real.create_start_state();
            let mut rng = rand::thread_rng();

            for _ in 0..20 {
                let policy = planner.select_action().unwrap();
                let action = policy.sample(&mut rng);
                let mut rc = cpomcp::rc::RC::ZERO;
                let (obs, terminal) = real.step(&mut state, action, &mut rc);
                if terminal || !planner.update(action, obs).unwrap() {
                    break;
                }
            }
            black_box(planner.lambda())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_select_action, bench_episode);
criterion_main!(benches);
