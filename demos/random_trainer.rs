//! Trainer issuing uniformly random actions.
//!
//! ```text
//! cargo run --example random_trainer -- config.json
//! ```
//!
//! Without a config file the trainer listens on the default TCP address
//! and waits for one peer. Episodes restart once the whole batch is done.

use gymwire::{GymConfig, Matrix, Result, Trainer};
use rand::Rng;

const BATCH_SIZE: usize = 8;
const EPISODES: usize = 3;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let config = match std::env::args().nth(1) {
        Some(path) => GymConfig::from_json_file(path)?,
        None => GymConfig::default(),
    };

    let mut trainer = Trainer::from_config(config).await?;
    let (state_size, action_size) = trainer.connect().await?;
    tracing::info!("state_size={}, action_size={}", state_size, action_size);

    let mut rng = rand::thread_rng();
    trainer.reset(BATCH_SIZE).await?;

    for episode in 0..EPISODES {
        let mut returns = vec![0.0f32; BATCH_SIZE];
        let mut steps = 0usize;

        let final_states = loop {
            let actions = Matrix::from_fn(BATCH_SIZE, action_size, |_, _| rng.gen_range(-1.0..1.0));
            let result = trainer.step(&actions).await?;
            steps += 1;
            for (ret, reward) in returns.iter_mut().zip(&result.rewards) {
                *ret += reward;
            }
            if result.is_finished() {
                break result.states;
            }
        };

        let mean = returns.iter().sum::<f32>() / BATCH_SIZE as f32;
        tracing::info!(
            "episode {}: {} steps, mean return {:.3}, slot 0 final state {:?}",
            episode,
            steps,
            mean,
            final_states.row(0)
        );
        if episode + 1 < EPISODES {
            trainer.reset(BATCH_SIZE).await?;
        }
    }

    trainer.close().await
}
