//! Matrix-shaped reset/step over one logical session.

use tokio::io::{AsyncRead, AsyncWrite};

use super::matrix::{ActionMatrix, Matrix, StateMatrix, StepBatch};
use crate::aggregator::Aggregator;
use crate::error::{GymwireError, Result};
use crate::protocol::{Dimensions, ProtocolEngine};

/// Presents batched environments as matrix operations.
///
/// Action shapes are validated before anything reaches the transport, so a
/// bad matrix never leaves a half-written request on the stream.
pub struct BatchOrchestrator<S> {
    sessions: Aggregator<S>,
}

impl<S> BatchOrchestrator<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Orchestrate an aggregate of one or more peers.
    pub fn new(sessions: Aggregator<S>) -> Self {
        Self { sessions }
    }

    /// Orchestrate a single peer.
    pub fn from_session(session: ProtocolEngine<S>) -> Result<Self> {
        Ok(Self::new(Aggregator::new(vec![session])?))
    }

    /// Floats per state row.
    #[inline]
    pub fn state_size(&self) -> usize {
        self.sessions.dimensions().state_size
    }

    /// Floats per action row.
    #[inline]
    pub fn action_size(&self) -> usize {
        self.sessions.dimensions().action_size
    }

    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        self.sessions.dimensions()
    }

    /// Rows per batch, `None` before the first reset.
    #[inline]
    pub fn batch_size(&self) -> Option<usize> {
        self.sessions.batch_size()
    }

    /// Number of connected peers.
    #[inline]
    pub fn peer_count(&self) -> usize {
        self.sessions.peer_count()
    }

    #[inline]
    pub fn is_faulted(&self) -> bool {
        self.sessions.is_faulted()
    }

    /// Borrow the underlying aggregate.
    pub fn sessions(&self) -> &Aggregator<S> {
        &self.sessions
    }

    /// Start a new batch of `batch_size` environments.
    ///
    /// Returns a `batch_size × state_size` matrix of initial states.
    pub async fn reset(&mut self, batch_size: usize) -> Result<StateMatrix> {
        let states = self.sessions.reset(batch_size).await?;
        Matrix::from_flat(batch_size, self.state_size(), states)
    }

    /// Step every slot with its action row.
    pub async fn step(&mut self, actions: &ActionMatrix) -> Result<StepBatch> {
        self.step_with_render(actions, false).await
    }

    /// Step every slot, asking peers to render when the protocol carries the flag.
    pub async fn step_with_render(
        &mut self,
        actions: &ActionMatrix,
        render: bool,
    ) -> Result<StepBatch> {
        self.validate_actions(actions)?;
        let batch_size = actions.rows();

        let response = self.sessions.step(actions.as_slice(), render).await?;
        let states = Matrix::from_flat(batch_size, self.state_size(), response.states)?;

        Ok(StepBatch {
            states,
            rewards: response.rewards,
            dones: response.dones,
        })
    }

    /// Check `actions` against the current batch without touching the transport.
    pub fn validate_actions(&self, actions: &ActionMatrix) -> Result<()> {
        if self.is_faulted() {
            return Err(GymwireError::SessionFaulted);
        }
        let batch_size = self.batch_size().ok_or(GymwireError::NotReady)?;
        actions.expect_shape(batch_size, self.action_size())
    }

    /// Close every peer connection.
    pub async fn close(self) -> Result<()> {
        self.sessions.close().await
    }
}
