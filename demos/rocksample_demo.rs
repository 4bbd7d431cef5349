//! Plans a single rock-sample episode step by step and prints what the planner decided.
//!
//! Run with `cargo run --example rocksample_demo`.

use cpomcp::config::SearchParams;
use cpomcp::domains::RockSample;
use cpomcp::mcts::Mcts;
use cpomcp::simulator::Simulator;

fn main() -> cpomcp::Result<()> {
    env_logger::init();

    let real = RockSample::new(5, 5, 42);
    let sim = RockSample::new(5, 5, 7);

    let params = SearchParams::default()
        .with_num_simulations(2_000)
        .with_num_start_states(200)
        .with_admissible_cost(3.0);

    let mut planner = Mcts::new(sim, params)?;
    let mut state = real.create_start_state();
    let mut rng = rand::thread_rng();

    for step in 0..50 {
        let policy = planner.select_action()?;
        let action = policy.sample(&mut rng);

        let mut rc = cpomcp::rc::RC::ZERO;
        let (observation, terminal) = real.step(&mut state, action, &mut rc);

        println!(
            "step {step}: action={action} reward={:.2} cost={:.2} lambda={:.3}",
            rc.r,
            rc.c,
            planner.lambda()
        );

        if terminal {
            println!("episode terminated after {} steps", step + 1);
            break;
        }

        if !planner.update(action, observation)? {
            println!("particle deprivation; stopping demo early");
            break;
        }
    }

    Ok(())
}
