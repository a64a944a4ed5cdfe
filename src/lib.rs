//! # gymwire
//!
//! Batched reset/step protocol between a trainer and remote environment
//! processes.
//!
//! Environment peers connect to the trainer, announce their action and
//! state sizes, and then answer two commands:
//!
//! - **Reset**: start `batch_size` environments, reply with their states
//!   followed by a sync token
//! - **Step**: apply one action per slot, reply with next state, reward and
//!   done flag per slot
//!
//! Every value is a 4-byte little-endian `i32` or `f32`; there is no framing.
//!
//! ## Architecture
//!
//! - [`transport`]: exact-length byte moves over TCP, Unix sockets or named pipes
//! - [`protocol`]: wire layout, session state machine, one-peer engine
//! - [`Aggregator`]: several peers presented as one session
//! - [`batch`]: matrix API with shape checks ahead of any I/O
//! - [`Trainer`]: configuration-driven bind / connect / reset / step
//! - [`EnvironmentPeer`]: the environment side
//!
//! ## Example
//!
//! ```ignore
//! use gymwire::{Matrix, Trainer};
//!
//! #[tokio::main]
//! async fn main() -> gymwire::Result<()> {
//!     let mut trainer = Trainer::builder().tcp("127.0.0.1:5041").bind().await?;
//!     let (_state_size, action_size) = trainer.connect().await?;
//!
//!     let _states = trainer.reset(4).await?;
//!     loop {
//!         let result = trainer.step(&Matrix::zeros(4, action_size)).await?;
//!         if result.is_finished() {
//!             trainer.reset(4).await?;
//!         }
//!     }
//! }
//! ```

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

mod aggregator;
mod listener;
mod peer;
mod trainer;

#[cfg(test)]
mod testing;

pub use aggregator::Aggregator;
pub use batch::{ActionMatrix, BatchOrchestrator, Matrix, StateMatrix, StepBatch};
pub use config::{Endpoint, GymConfig};
pub use error::{GymwireError, Result};
pub use listener::SessionListener;
pub use peer::{Environment, EnvironmentPeer};
pub use protocol::{Dimensions, ProtocolEngine, ProtocolOptions, SessionState};
pub use trainer::{Trainer, TrainerBuilder};
