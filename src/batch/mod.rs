//! Batch module - matrix types and the batch orchestrator.
//!
//! - [`Matrix`] / [`StateMatrix`] / [`ActionMatrix`]: row per slot
//! - [`StepBatch`]: states, rewards and done flags of one step
//! - [`BatchOrchestrator`]: `reset(batch_size)` and `step(actions)` with
//!   shape validation ahead of any I/O

mod matrix;
mod orchestrator;

pub use matrix::{ActionMatrix, Matrix, StateMatrix, StepBatch};
pub use orchestrator::BatchOrchestrator;
