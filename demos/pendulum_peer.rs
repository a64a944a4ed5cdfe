//! Environment peer serving a batch of inverted pendulums.
//!
//! ```text
//! cargo run --example pendulum_peer -- 127.0.0.1:5041
//! ```
//!
//! A path argument that does not look like `host:port` is treated as a
//! Unix socket / named pipe.

use gymwire::{
    ActionMatrix, Endpoint, Environment, EnvironmentPeer, Matrix, ProtocolOptions, Result,
    StateMatrix, StepBatch,
};
use rand::Rng;

const MAX_SPEED: f32 = 8.0;
const MAX_TORQUE: f32 = 2.0;
const DT: f32 = 0.05;
const GRAVITY: f32 = 10.0;
const EPISODE_STEPS: usize = 200;

/// State row: `cos θ, sin θ, θ'`. Action row: torque.
struct Pendulums {
    theta: Vec<f32>,
    theta_dot: Vec<f32>,
    steps: usize,
}

impl Pendulums {
    fn observe(&self) -> StateMatrix {
        Matrix::from_fn(self.theta.len(), 3, |r, c| match c {
            0 => self.theta[r].cos(),
            1 => self.theta[r].sin(),
            _ => self.theta_dot[r],
        })
    }
}

fn normalize_angle(x: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;
    (x + std::f32::consts::PI).rem_euclid(two_pi) - std::f32::consts::PI
}

impl Environment for Pendulums {
    fn action_size(&self) -> usize {
        1
    }

    fn state_size(&self) -> usize {
        3
    }

    fn reset(&mut self, batch_size: usize) -> Result<StateMatrix> {
        let mut rng = rand::thread_rng();
        self.theta = (0..batch_size)
            .map(|_| rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI))
            .collect();
        self.theta_dot = (0..batch_size).map(|_| rng.gen_range(-1.0..1.0)).collect();
        self.steps = 0;
        Ok(self.observe())
    }

    fn step(&mut self, actions: &ActionMatrix, render: bool) -> Result<StepBatch> {
        self.steps += 1;
        let mut rewards = Vec::with_capacity(self.theta.len());

        for (slot, row) in actions.iter_rows().enumerate() {
            let u = row[0].clamp(-MAX_TORQUE, MAX_TORQUE);
            let th = self.theta[slot];
            let th_dot = self.theta_dot[slot];

            let cost = normalize_angle(th).powi(2) + 0.1 * th_dot.powi(2) + 0.001 * u.powi(2);
            rewards.push(-cost);

            let new_dot = (th_dot + (3.0 * GRAVITY / 2.0 * th.sin() + 3.0 * u) * DT)
                .clamp(-MAX_SPEED, MAX_SPEED);
            self.theta[slot] = th + new_dot * DT;
            self.theta_dot[slot] = new_dot;
        }

        if render {
            tracing::info!("step {}: slot 0 θ={:.3}", self.steps, normalize_angle(self.theta[0]));
        }

        Ok(StepBatch {
            states: self.observe(),
            rewards,
            dones: vec![self.steps >= EPISODE_STEPS; self.theta.len()],
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| gymwire::config::DEFAULT_TCP_ADDR.to_string());
    let endpoint = if target.parse::<std::net::SocketAddr>().is_ok() {
        Endpoint::Tcp { addr: target }
    } else {
        Endpoint::Pipe { path: target }
    };

    let env = Pendulums {
        theta: Vec::new(),
        theta_dot: Vec::new(),
        steps: 0,
    };
    let stream = endpoint.connect().await?;
    let mut peer = EnvironmentPeer::new(stream, env, ProtocolOptions::default());
    peer.handshake().await?;
    peer.serve().await?;
    peer.close().await?;
    Ok(())
}
